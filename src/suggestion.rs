// Wattsim - Energy consumption telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Human-readable suggestions attached to aggregated alerts.
//!
//! A suggestion is a short/long message pair picked at random from a
//! per-tier pool, optionally followed by an energy-saving tip. The tip pool
//! grows with the [`TemporalContext`]: summer, winter, night and weekend each
//! contribute their own tips on top of the general ones.

use crate::config::SuggestionConfig;
use crate::context::TemporalContext;
use crate::protocol::Tier;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Label introducing the appended tip.
pub const TIP_MARKER: &str = "Tip:";

/// A short/long message pair; `{avg}` in the description is replaced by the
/// average reading with two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub short: &'static str,
    pub description: &'static str,
}

const fn template(short: &'static str, description: &'static str) -> Template {
    Template { short, description }
}

/// Templates for critical alerts.
pub const CRITICAL_TEMPLATES: [Template; 5] = [
    template(
        "Critical consumption alert!",
        "Your energy consumption has reached critical levels. This could point to a problem in your wiring or a faulty appliance.",
    ),
    template(
        "Excessive consumption detected",
        "Your current consumption of {avg} kWh is far above the recommended level. Check high-draw appliances such as air conditioners or heaters.",
    ),
    template(
        "Consumption peak detected!",
        "An abnormal peak in your energy consumption was detected. Check whether several appliances are running at once or one of them is failing.",
    ),
    template(
        "Possible electrical leak",
        "Consumption sustained at critical levels could indicate an electrical leak. Consider asking an electrician to inspect your installation.",
    ),
    template(
        "Overload risk",
        "The current consumption level puts your electrical installation at risk. Spread appliance usage over time to avoid overloads.",
    ),
];

/// Templates for warning alerts.
pub const WARNING_TEMPLATES: [Template; 5] = [
    template(
        "Consumption above average",
        "Your consumption is above the recommended average. Consider switching off devices you are not using.",
    ),
    template(
        "Optimize your energy consumption",
        "You have been consuming {avg} kWh on average. Check appliances such as fridges, TVs on standby or chargers left plugged in.",
    ),
    template(
        "Gradual increase detected",
        "We noticed a gradual increase in your energy consumption. It may come from intensive use of some appliances.",
    ),
    template(
        "Consider off-peak hours",
        "Your consumption is elevated. Running appliances during off-peak hours (22:00-08:00) can help lower your costs.",
    ),
    template(
        "Watch your consumption",
        "Your home is using more energy than usual. Check whether some appliances draw more than expected.",
    ),
];

/// Templates for excellent alerts.
pub const EXCELLENT_TEMPLATES: [Template; 3] = [
    template(
        "Excellent energy consumption!",
        "Your consumption stays at optimal levels. Keep it up for an efficient home!",
    ),
    template(
        "Efficient consumption detected",
        "With an average consumption of {avg} kWh, you are using energy efficiently. Congratulations!",
    ),
    template(
        "Remarkable energy savings",
        "Your consumption pattern shows responsible energy use. That means lower bills and a smaller environmental impact.",
    ),
];

/// Tips offered in any context.
pub const GENERAL_TIPS: [&str; 6] = [
    "Replacing traditional bulbs with LEDs can cut lighting consumption by up to 80%.",
    "Unplugging appliances instead of leaving them on standby can save up to 10% on your bill.",
    "Appliances rated A+++ use up to 80% less energy.",
    "Regular maintenance keeps appliances efficient and lowers their consumption.",
    "Power strips with a switch make it easy to turn several devices fully off at once.",
    "Checking your meter regularly helps spot unexpected consumption peaks.",
];

/// Tips added in summer.
pub const SUMMER_TIPS: [&str; 4] = [
    "Keeping the air conditioning at 24°C is both economical and comfortable.",
    "Using fans instead of air conditioning can significantly reduce your consumption.",
    "Closing blinds during the sunniest hours reduces the need for cooling.",
    "Scheduling the air conditioning to switch off at night can bring significant savings.",
];

/// Tips added in winter.
pub const WINTER_TIPS: [&str; 4] = [
    "Keeping the heating between 19 and 21°C gives comfort at a moderate consumption.",
    "Draught excluders on doors and windows stop heat loss and reduce consumption.",
    "Scheduling the heating to turn down at night saves energy.",
    "Airing the house for 10 minutes a day renews the air without losing much heat.",
];

/// Tips added at night.
pub const NIGHT_TIPS: [&str; 3] = [
    "Take advantage of night tariffs to run appliances such as washing machines and dishwashers.",
    "Reducing lighting in unused areas of the house lowers consumption.",
    "Timers that switch devices off overnight avoid unnecessary consumption.",
];

/// Tips added on weekends.
pub const WEEKEND_TIPS: [&str; 3] = [
    "Make the most of weekend daylight to reduce artificial lighting.",
    "If you go away for the weekend, remember to unplug the main appliances.",
    "The weekend is a good time to review the schedules of your smart devices.",
];

/// Message templates for a tier.
pub fn templates(tier: Tier) -> &'static [Template] {
    match tier {
        Tier::Critical => &CRITICAL_TEMPLATES,
        Tier::Warning => &WARNING_TEMPLATES,
        Tier::Excellent => &EXCELLENT_TEMPLATES,
    }
}

/// Candidate tips for a context: general tips plus one pool per true flag.
pub fn tip_pool(context: &TemporalContext) -> Vec<&'static str> {
    let mut pool: Vec<&'static str> = GENERAL_TIPS.to_vec();
    if context.is_summer {
        pool.extend_from_slice(&SUMMER_TIPS);
    }
    if context.is_winter {
        pool.extend_from_slice(&WINTER_TIPS);
    }
    if context.is_night {
        pool.extend_from_slice(&NIGHT_TIPS);
    }
    if context.is_weekend {
        pool.extend_from_slice(&WEEKEND_TIPS);
    }
    pool
}

/// Suggestion content derived from an aggregated alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub device_id: String,
    pub tier: Tier,
    pub short_message: String,
    /// Template description, possibly followed by a tip.
    pub description: String,
    /// Average reading of the aggregated alert.
    pub related_reading: f64,
    /// Whether the user has read it; always `false` on creation.
    pub read: bool,
    /// Context snapshot at creation.
    pub context: TemporalContext,
}

impl Suggestion {
    /// True when a tip was appended to the description.
    pub fn has_tip(&self) -> bool {
        self.description.contains(TIP_MARKER)
    }
}

/// Suggestion generator.
#[derive(Debug, Clone, Default)]
pub struct SuggestionGenerator {
    config: SuggestionConfig,
}

impl SuggestionGenerator {
    /// Create a generator with the given configuration.
    pub fn new(config: SuggestionConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SuggestionConfig {
        &self.config
    }

    /// Decide whether an alert of this tier gets a suggestion.
    ///
    /// Critical and warning always do and consume no randomness; excellent
    /// does with the configured probability.
    pub fn should_suggest(&self, tier: Tier, rng: &mut dyn RngCore) -> bool {
        match tier {
            Tier::Critical | Tier::Warning => true,
            Tier::Excellent => rng.gen::<f64>() < self.config.excellent_probability,
        }
    }

    /// Build a suggestion for an alert.
    pub fn suggest(
        &self,
        device_id: &str,
        tier: Tier,
        average: f64,
        context: TemporalContext,
        rng: &mut dyn RngCore,
    ) -> Suggestion {
        let pool = templates(tier);
        let chosen = &pool[rng.gen_range(0..pool.len())];

        let mut description = chosen
            .description
            .replace("{avg}", &format!("{:.2}", average));

        if rng.gen::<f64>() < self.config.tip_probability {
            let tips = tip_pool(&context);
            let tip = tips[rng.gen_range(0..tips.len())];
            description.push_str("\n\n");
            description.push_str(TIP_MARKER);
            description.push(' ');
            description.push_str(tip);
        }

        Suggestion {
            device_id: device_id.to_string(),
            tier,
            short_message: chosen.short.to_string(),
            description,
            related_reading: average,
            read: false,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn all_flags() -> TemporalContext {
        TemporalContext {
            is_summer: true,
            is_winter: true,
            is_night: true,
            is_weekend: true,
        }
    }

    #[test]
    fn test_template_pool_sizes() {
        assert_eq!(templates(Tier::Critical).len(), 5);
        assert_eq!(templates(Tier::Warning).len(), 5);
        assert_eq!(templates(Tier::Excellent).len(), 3);
    }

    #[test]
    fn test_tip_pool_grows_with_context() {
        assert_eq!(tip_pool(&TemporalContext::default()).len(), 6);

        let summer_night = TemporalContext {
            is_summer: true,
            is_night: true,
            ..Default::default()
        };
        let pool = tip_pool(&summer_night);
        assert_eq!(pool.len(), 6 + 4 + 3);
        assert!(pool.contains(&SUMMER_TIPS[0]));
        assert!(pool.contains(&NIGHT_TIPS[2]));
        assert!(!pool.contains(&WINTER_TIPS[0]));

        assert_eq!(tip_pool(&all_flags()).len(), 6 + 4 + 4 + 3 + 3);
    }

    #[test]
    fn test_should_suggest_always_for_critical_and_warning() {
        let generator = SuggestionGenerator::new(SuggestionConfig {
            excellent_probability: 0.0,
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert!(generator.should_suggest(Tier::Critical, &mut rng));
            assert!(generator.should_suggest(Tier::Warning, &mut rng));
            assert!(!generator.should_suggest(Tier::Excellent, &mut rng));
        }
    }

    #[test]
    fn test_excellent_gate_is_about_one_third() {
        let generator = SuggestionGenerator::default();
        let mut rng = StdRng::seed_from_u64(2);
        let n = 30_000;
        let hits = (0..n)
            .filter(|_| generator.should_suggest(Tier::Excellent, &mut rng))
            .count();
        let share = hits as f64 / n as f64;
        assert!((share - 1.0 / 3.0).abs() < 0.02, "share {}", share);
    }

    #[test]
    fn test_suggestion_fields() {
        let generator = SuggestionGenerator::default();
        let mut rng = StdRng::seed_from_u64(3);
        let ctx = all_flags();
        let s = generator.suggest("d1", Tier::Warning, 2.71828, ctx, &mut rng);

        assert_eq!(s.device_id, "d1");
        assert_eq!(s.tier, Tier::Warning);
        assert!(!s.read);
        assert_eq!(s.context, ctx);
        assert!((s.related_reading - 2.71828).abs() < 1e-12);
        assert!(WARNING_TEMPLATES.iter().any(|t| t.short == s.short_message));
        assert!(!s.description.contains("{avg}"));
    }

    #[test]
    fn test_average_interpolated_with_two_decimals() {
        let generator = SuggestionGenerator::new(SuggestionConfig {
            tip_probability: 0.0,
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(4);
        let mut seen = false;
        for _ in 0..200 {
            let s = generator.suggest("d1", Tier::Excellent, 1.23456, TemporalContext::default(), &mut rng);
            if s.short_message == EXCELLENT_TEMPLATES[1].short {
                assert!(s.description.contains("1.23 kWh"));
                seen = true;
            }
        }
        assert!(seen);
    }

    #[test]
    fn test_tip_format() {
        let generator = SuggestionGenerator::new(SuggestionConfig {
            tip_probability: 1.0,
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(5);
        let s = generator.suggest("d1", Tier::Critical, 3.3, TemporalContext::default(), &mut rng);

        assert!(s.has_tip());
        let (body, tip) = s.description.split_once("\n\nTip: ").unwrap();
        assert!(CRITICAL_TEMPLATES
            .iter()
            .any(|t| t.description.replace("{avg}", "3.30") == body));
        assert!(GENERAL_TIPS.contains(&tip));
    }

    #[test]
    fn test_no_tip_when_disabled() {
        let generator = SuggestionGenerator::new(SuggestionConfig {
            tip_probability: 0.0,
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..100 {
            let s = generator.suggest("d1", Tier::Warning, 2.5, all_flags(), &mut rng);
            assert!(!s.has_tip());
        }
    }

    #[test]
    fn test_tip_rate_is_about_seventy_percent() {
        let generator = SuggestionGenerator::default();
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let with_tip = (0..n)
            .map(|_| generator.suggest("d1", Tier::Critical, 3.3, all_flags(), &mut rng))
            .filter(Suggestion::has_tip)
            .count();
        let share = with_tip as f64 / n as f64;
        assert!((share - 0.7).abs() < 0.02, "share {}", share);
    }

    #[test]
    fn test_reproducible_with_seed() {
        let generator = SuggestionGenerator::default();
        let a = generator.suggest("d1", Tier::Critical, 3.3, all_flags(), &mut StdRng::seed_from_u64(8));
        let b = generator.suggest("d1", Tier::Critical, 3.3, all_flags(), &mut StdRng::seed_from_u64(8));
        assert_eq!(a, b);
    }
}
