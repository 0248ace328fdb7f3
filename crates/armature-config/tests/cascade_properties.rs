//! Property tests for the cascade: for every leaf, the resolved value equals
//! the value from the highest-priority source that defines it, and equals the
//! builtin default only when none does.

use armature_config::{ConfigSource, FormatSource, NumberSource, ResolvedConfig, resolve};
use proptest::option;
use proptest::prelude::*;

fn locale_strategy() -> impl Strategy<Value = Option<String>> {
    option::of(prop_oneof![
        Just("en-US".to_string()),
        Just("fr-FR".to_string()),
        Just("de-DE".to_string()),
        Just("ja-JP".to_string()),
    ])
}

fn source_strategy() -> impl Strategy<Value = ConfigSource> {
    (
        locale_strategy(),
        option::of(any::<bool>()),
        option::of(option::of(any::<bool>()).prop_map(|use_grouping| NumberSource {
            decimals: None,
            use_grouping,
        })),
    )
        .prop_map(|(locale, persistence, number)| ConfigSource {
            locale,
            persistence,
            formats: number.map(|number| FormatSource {
                number: Some(number),
                ..Default::default()
            }),
            ..Default::default()
        })
}

/// First defined value across the priority-ordered tiers.
fn oracle<T: Clone>(tiers: [Option<T>; 3], default: T) -> T {
    tiers
        .into_iter()
        .flatten()
        .next()
        .unwrap_or(default)
}

proptest! {
    #[test]
    fn each_leaf_takes_highest_priority_defined_value(
        component in source_strategy(),
        user in source_strategy(),
        system in source_strategy(),
    ) {
        let cfg = resolve(Some(&component), Some(&user), Some(&system));
        let defaults = ResolvedConfig::default();

        prop_assert_eq!(
            cfg.locale,
            oracle(
                [component.locale.clone(), user.locale.clone(), system.locale.clone()],
                defaults.locale,
            )
        );
        prop_assert_eq!(
            cfg.persistence,
            oracle(
                [component.persistence, user.persistence, system.persistence],
                defaults.persistence,
            )
        );

        let grouping_leaf = |s: &ConfigSource| {
            s.formats
                .as_ref()
                .and_then(|f| f.number.as_ref())
                .and_then(|n| n.use_grouping)
        };
        prop_assert_eq!(
            cfg.formats.number.use_grouping,
            oracle(
                [grouping_leaf(&component), grouping_leaf(&user), grouping_leaf(&system)],
                defaults.formats.number.use_grouping,
            )
        );

        // Leaves no source defines always land on the builtin default.
        prop_assert_eq!(cfg.timezone, defaults.timezone);
        prop_assert_eq!(cfg.formats.number.decimals, defaults.formats.number.decimals);
    }

    #[test]
    fn absent_and_empty_sources_are_equivalent(
        user in source_strategy(),
    ) {
        let empty = ConfigSource::default();
        let with_empty = resolve(Some(&empty), Some(&user), Some(&empty));
        let with_absent = resolve(None, Some(&user), None);
        prop_assert_eq!(with_empty, with_absent);
    }
}
