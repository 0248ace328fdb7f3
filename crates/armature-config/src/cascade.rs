#![forbid(unsafe_code)]

//! Priority-ordered merge of configuration sources.
//!
//! [`resolve`] walks the three partial trees leaf by leaf, taking the value
//! from the highest-priority source that *defines* the leaf and falling back
//! to the builtin default when none does. Presence is `Option::is_some`,
//! never truthiness, so `Some(false)` and `Some(0)` participate like any
//! other value.
//!
//! The merge is parameterized over the tree shape by the [`Cascade`] trait:
//! each interior node resolves its children by recursing with the matching
//! child of every source, which keeps subtree presence and leaf presence
//! independent.
//!
//! # Invariants
//!
//! 1. Total: never fails, for any combination of present/absent sources.
//! 2. Per-leaf: `resolve(c, u, s).leaf` depends only on `c.leaf`, `u.leaf`,
//!    `s.leaf`.
//! 3. Identity: `resolve(None, None, None) == ResolvedConfig::default()`.

use crate::tree::{
    ConfigSource, CurrencySource, DurationSource, FileSizeSource, FormatSource, NumberSource,
    PercentageSource, ResolvedConfig, ResolvedCurrency, ResolvedDuration, ResolvedFileSize,
    ResolvedFormats, ResolvedNumber, ResolvedPercentage,
};

/// A partial tree node that can be merged by priority into a resolved node.
pub trait Cascade {
    /// The fully-resolved counterpart of this node.
    type Resolved;

    /// Merge `component ▸ user ▸ system ▸ defaults`, leaf by leaf.
    fn resolve(
        component: Option<&Self>,
        user: Option<&Self>,
        system: Option<&Self>,
    ) -> Self::Resolved;
}

/// Resolve one leaf: first defined source wins, else the builtin default.
fn leaf<T: Clone>(
    component: Option<&T>,
    user: Option<&T>,
    system: Option<&T>,
    default: T,
) -> T {
    component
        .or(user)
        .or(system)
        .cloned()
        .unwrap_or(default)
}

/// Project a child node out of each source for recursion.
fn child<'a, P, C>(
    component: Option<&'a P>,
    user: Option<&'a P>,
    system: Option<&'a P>,
    get: impl Fn(&P) -> Option<&C>,
) -> (Option<&'a C>, Option<&'a C>, Option<&'a C>)
where
    C: 'a,
{
    (
        component.and_then(&get),
        user.and_then(&get),
        system.and_then(&get),
    )
}

/// Resolve a full configuration from up to three sources.
///
/// Pure and total; absent sources are treated as empty trees.
///
/// ```
/// use armature_config::{ConfigSource, resolve};
///
/// let user = ConfigSource { locale: Some("fr-FR".into()), ..Default::default() };
/// let system = ConfigSource { locale: Some("de-DE".into()), ..Default::default() };
///
/// let cfg = resolve(None, Some(&user), Some(&system));
/// assert_eq!(cfg.locale, "fr-FR");
/// assert_eq!(cfg.timezone, "UTC"); // builtin default
/// ```
#[must_use]
pub fn resolve(
    component: Option<&ConfigSource>,
    user: Option<&ConfigSource>,
    system: Option<&ConfigSource>,
) -> ResolvedConfig {
    ConfigSource::resolve(component, user, system)
}

impl Cascade for ConfigSource {
    type Resolved = ResolvedConfig;

    fn resolve(
        component: Option<&Self>,
        user: Option<&Self>,
        system: Option<&Self>,
    ) -> ResolvedConfig {
        let defaults = ResolvedConfig::default();
        let (fc, fu, fs) = child(component, user, system, |s: &Self| s.formats.as_ref());
        ResolvedConfig {
            locale: leaf(
                component.and_then(|s| s.locale.as_ref()),
                user.and_then(|s| s.locale.as_ref()),
                system.and_then(|s| s.locale.as_ref()),
                defaults.locale,
            ),
            timezone: leaf(
                component.and_then(|s| s.timezone.as_ref()),
                user.and_then(|s| s.timezone.as_ref()),
                system.and_then(|s| s.timezone.as_ref()),
                defaults.timezone,
            ),
            direction: leaf(
                component.and_then(|s| s.direction.as_ref()),
                user.and_then(|s| s.direction.as_ref()),
                system.and_then(|s| s.direction.as_ref()),
                defaults.direction,
            ),
            persistence: leaf(
                component.and_then(|s| s.persistence.as_ref()),
                user.and_then(|s| s.persistence.as_ref()),
                system.and_then(|s| s.persistence.as_ref()),
                defaults.persistence,
            ),
            formats: FormatSource::resolve(fc, fu, fs),
        }
    }
}

impl Cascade for FormatSource {
    type Resolved = ResolvedFormats;

    fn resolve(
        component: Option<&Self>,
        user: Option<&Self>,
        system: Option<&Self>,
    ) -> ResolvedFormats {
        let defaults = ResolvedFormats::default();
        let (cc, cu, cs) = child(component, user, system, |s: &Self| s.currency.as_ref());
        let (nc, nu, ns) = child(component, user, system, |s: &Self| s.number.as_ref());
        let (pc, pu, ps) = child(component, user, system, |s: &Self| s.percentage.as_ref());
        let (zc, zu, zs) = child(component, user, system, |s: &Self| s.file_size.as_ref());
        let (dc, du, ds) = child(component, user, system, |s: &Self| s.duration.as_ref());
        ResolvedFormats {
            date: leaf(
                component.and_then(|s| s.date.as_ref()),
                user.and_then(|s| s.date.as_ref()),
                system.and_then(|s| s.date.as_ref()),
                defaults.date,
            ),
            time: leaf(
                component.and_then(|s| s.time.as_ref()),
                user.and_then(|s| s.time.as_ref()),
                system.and_then(|s| s.time.as_ref()),
                defaults.time,
            ),
            datetime: leaf(
                component.and_then(|s| s.datetime.as_ref()),
                user.and_then(|s| s.datetime.as_ref()),
                system.and_then(|s| s.datetime.as_ref()),
                defaults.datetime,
            ),
            currency: CurrencySource::resolve(cc, cu, cs),
            number: NumberSource::resolve(nc, nu, ns),
            percentage: PercentageSource::resolve(pc, pu, ps),
            file_size: FileSizeSource::resolve(zc, zu, zs),
            duration: DurationSource::resolve(dc, du, ds),
        }
    }
}

impl Cascade for CurrencySource {
    type Resolved = ResolvedCurrency;

    fn resolve(
        component: Option<&Self>,
        user: Option<&Self>,
        system: Option<&Self>,
    ) -> ResolvedCurrency {
        let defaults = ResolvedCurrency::default();
        ResolvedCurrency {
            symbol: leaf(
                component.and_then(|s| s.symbol.as_ref()),
                user.and_then(|s| s.symbol.as_ref()),
                system.and_then(|s| s.symbol.as_ref()),
                defaults.symbol,
            ),
            decimals: leaf(
                component.and_then(|s| s.decimals.as_ref()),
                user.and_then(|s| s.decimals.as_ref()),
                system.and_then(|s| s.decimals.as_ref()),
                defaults.decimals,
            ),
        }
    }
}

impl Cascade for NumberSource {
    type Resolved = ResolvedNumber;

    fn resolve(
        component: Option<&Self>,
        user: Option<&Self>,
        system: Option<&Self>,
    ) -> ResolvedNumber {
        let defaults = ResolvedNumber::default();
        ResolvedNumber {
            decimals: leaf(
                component.and_then(|s| s.decimals.as_ref()),
                user.and_then(|s| s.decimals.as_ref()),
                system.and_then(|s| s.decimals.as_ref()),
                defaults.decimals,
            ),
            use_grouping: leaf(
                component.and_then(|s| s.use_grouping.as_ref()),
                user.and_then(|s| s.use_grouping.as_ref()),
                system.and_then(|s| s.use_grouping.as_ref()),
                defaults.use_grouping,
            ),
        }
    }
}

impl Cascade for PercentageSource {
    type Resolved = ResolvedPercentage;

    fn resolve(
        component: Option<&Self>,
        user: Option<&Self>,
        system: Option<&Self>,
    ) -> ResolvedPercentage {
        let defaults = ResolvedPercentage::default();
        ResolvedPercentage {
            decimals: leaf(
                component.and_then(|s| s.decimals.as_ref()),
                user.and_then(|s| s.decimals.as_ref()),
                system.and_then(|s| s.decimals.as_ref()),
                defaults.decimals,
            ),
        }
    }
}

impl Cascade for FileSizeSource {
    type Resolved = ResolvedFileSize;

    fn resolve(
        component: Option<&Self>,
        user: Option<&Self>,
        system: Option<&Self>,
    ) -> ResolvedFileSize {
        let defaults = ResolvedFileSize::default();
        ResolvedFileSize {
            unit: leaf(
                component.and_then(|s| s.unit.as_ref()),
                user.and_then(|s| s.unit.as_ref()),
                system.and_then(|s| s.unit.as_ref()),
                defaults.unit,
            ),
            decimals: leaf(
                component.and_then(|s| s.decimals.as_ref()),
                user.and_then(|s| s.decimals.as_ref()),
                system.and_then(|s| s.decimals.as_ref()),
                defaults.decimals,
            ),
        }
    }
}

impl Cascade for DurationSource {
    type Resolved = ResolvedDuration;

    fn resolve(
        component: Option<&Self>,
        user: Option<&Self>,
        system: Option<&Self>,
    ) -> ResolvedDuration {
        let defaults = ResolvedDuration::default();
        ResolvedDuration {
            unit: leaf(
                component.and_then(|s| s.unit.as_ref()),
                user.and_then(|s| s.unit.as_ref()),
                system.and_then(|s| s.unit.as_ref()),
                defaults.unit,
            ),
            style: leaf(
                component.and_then(|s| s.style.as_ref()),
                user.and_then(|s| s.style.as_ref()),
                system.and_then(|s| s.style.as_ref()),
                defaults.style,
            ),
        }
    }
}
