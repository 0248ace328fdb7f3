#![forbid(unsafe_code)]

//! Configuration tree shapes: partial sources and the resolved tree.
//!
//! Source trees ([`ConfigSource`] and its nested nodes) carry every leaf as
//! an `Option`, so "not set" and "set to the default value" are distinct.
//! The resolved tree carries plain values and is immutable once computed.
//!
//! With the `serde` feature enabled the source trees deserialize from the
//! camelCase JSON documents hosts ship as system/user configuration.

/// Text direction for layout and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Left-to-right.
    #[default]
    Ltr,
    /// Right-to-left.
    Rtl,
}

/// Unit selection for file-size formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FileSizeUnit {
    /// Always raw bytes.
    Bytes,
    /// Pick the largest unit that keeps the value readable.
    #[default]
    Auto,
}

/// Unit selection for duration formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DurationUnit {
    Seconds,
    Minutes,
    Hours,
    /// Pick a unit based on magnitude.
    #[default]
    Auto,
}

/// Verbosity of formatted durations (`1h 5m` vs `1 hour 5 minutes`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DurationStyle {
    #[default]
    Short,
    Long,
}

// ---------------------------------------------------------------------------
// Partial source trees
// ---------------------------------------------------------------------------

/// One configuration source: a partial tree where every leaf is optional.
///
/// All three cascade tiers share this shape. Sources have no ownership
/// relationship to instances — the same source may be shared across any
/// number of widgets and outlive all of them.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct ConfigSource {
    /// BCP 47 locale tag, e.g. `"en-US"`.
    pub locale: Option<String>,
    /// IANA timezone name, e.g. `"UTC"`, `"Europe/Paris"`.
    pub timezone: Option<String>,
    pub direction: Option<Direction>,
    /// Enable state persistence (and with it, cross-context sync) for
    /// instances resolving this source.
    pub persistence: Option<bool>,
    pub formats: Option<FormatSource>,
}

/// Partial display-format settings.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct FormatSource {
    /// Date pattern, e.g. `"YYYY-MM-DD"`.
    pub date: Option<String>,
    /// Time pattern, e.g. `"HH:mm:ss"`.
    pub time: Option<String>,
    /// Combined date-time pattern.
    pub datetime: Option<String>,
    pub currency: Option<CurrencySource>,
    pub number: Option<NumberSource>,
    pub percentage: Option<PercentageSource>,
    pub file_size: Option<FileSizeSource>,
    pub duration: Option<DurationSource>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct CurrencySource {
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct NumberSource {
    pub decimals: Option<u8>,
    /// Thousands grouping. `Some(false)` is a real setting and must win over
    /// a lower tier's `Some(true)`.
    pub use_grouping: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct PercentageSource {
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct FileSizeSource {
    pub unit: Option<FileSizeUnit>,
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase", default))]
pub struct DurationSource {
    pub unit: Option<DurationUnit>,
    pub style: Option<DurationStyle>,
}

// ---------------------------------------------------------------------------
// Resolved tree
// ---------------------------------------------------------------------------

/// Fully-resolved configuration for one widget instance.
///
/// Immutable once computed for a given set of sources; recompute with
/// [`resolve`](crate::resolve) when any source changes. Has no identity of
/// its own beyond the owning instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub locale: String,
    pub timezone: String,
    pub direction: Direction,
    pub persistence: bool,
    pub formats: ResolvedFormats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFormats {
    pub date: String,
    pub time: String,
    pub datetime: String,
    pub currency: ResolvedCurrency,
    pub number: ResolvedNumber,
    pub percentage: ResolvedPercentage,
    pub file_size: ResolvedFileSize,
    pub duration: ResolvedDuration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCurrency {
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedNumber {
    pub decimals: u8,
    pub use_grouping: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPercentage {
    pub decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedFileSize {
    pub unit: FileSizeUnit,
    pub decimals: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDuration {
    pub unit: DurationUnit,
    pub style: DurationStyle,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            timezone: "UTC".to_string(),
            direction: Direction::Ltr,
            persistence: false,
            formats: ResolvedFormats::default(),
        }
    }
}

impl Default for ResolvedFormats {
    fn default() -> Self {
        Self {
            date: "YYYY-MM-DD".to_string(),
            time: "HH:mm:ss".to_string(),
            datetime: "YYYY-MM-DD HH:mm:ss".to_string(),
            currency: ResolvedCurrency::default(),
            number: ResolvedNumber::default(),
            percentage: ResolvedPercentage::default(),
            file_size: ResolvedFileSize::default(),
            duration: ResolvedDuration::default(),
        }
    }
}

impl Default for ResolvedCurrency {
    fn default() -> Self {
        Self {
            symbol: "$".to_string(),
            decimals: 2,
        }
    }
}

impl Default for ResolvedNumber {
    fn default() -> Self {
        Self {
            decimals: 2,
            use_grouping: true,
        }
    }
}

impl Default for ResolvedPercentage {
    fn default() -> Self {
        Self { decimals: 1 }
    }
}

impl Default for ResolvedFileSize {
    fn default() -> Self {
        Self {
            unit: FileSizeUnit::Auto,
            decimals: 2,
        }
    }
}

impl Default for ResolvedDuration {
    fn default() -> Self {
        Self {
            unit: DurationUnit::Auto,
            style: DurationStyle::Short,
        }
    }
}

impl ResolvedConfig {
    /// The resolved locale tag.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    /// The resolved timezone name.
    #[must_use]
    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// The resolved text direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether state persistence is enabled for the owning instance.
    #[must_use]
    pub fn persistence(&self) -> bool {
        self.persistence
    }
}
