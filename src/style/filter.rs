//! Filter configuration pushed in by the host UI
//!
//! A filter is an ordered list of tiers, highest priority first. Each tier
//! reads one numeric feature property and holds an ordered list of brackets.

use super::color::Color;
use crate::core::constants::DEFAULT_PALETTE;
use serde::{Deserialize, Serialize};

fn enabled_by_default() -> bool {
    true
}

/// A numeric range paired with a display color
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub min: f64,
    /// `None` means unbounded above
    #[serde(default)]
    pub max: Option<f64>,
    pub color: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub label: Option<String>,
}

impl Bracket {
    pub fn new(min: f64, max: Option<f64>, color: impl Into<String>) -> Self {
        Self {
            min,
            max,
            color: color.into(),
            enabled: true,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn upper(&self) -> f64 {
        self.max.unwrap_or(f64::INFINITY)
    }

    /// A finite lower bound and a finite or open upper bound
    pub fn has_usable_bounds(&self) -> bool {
        let upper = self.upper();
        self.min.is_finite() && (upper.is_finite() || upper == f64::INFINITY)
    }

    /// Inclusive on both ends
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.upper()
    }

    /// The bracket color, or palette entry `fallback` if it does not parse
    pub fn resolved_color(&self, fallback: usize) -> Color {
        Color::resolve(Some(&self.color), fallback)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub name: String,
    /// Feature property holding the value compared against the brackets
    pub property: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub brackets: Vec<Bracket>,
}

impl Tier {
    pub fn new(name: impl Into<String>, property: impl Into<String>, brackets: Vec<Bracket>) -> Self {
        Self {
            name: name.into(),
            property: property.into(),
            enabled: true,
            brackets,
        }
    }
}

/// Problems found by [`FilterConfig::validate`]; never fatal
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterWarning {
    #[error("tier {tier}: bracket {index} has min {min} above max {max}")]
    InvertedRange {
        tier: String,
        index: usize,
        min: f64,
        max: f64,
    },

    #[error("tier {tier}: bracket {index} has a NaN or infinite bound and is ignored")]
    NonFiniteBound { tier: String, index: usize },

    #[error("tier {tier}: brackets {first} and {second} overlap")]
    Overlap {
        tier: String,
        first: usize,
        second: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub tiers: Vec<Tier>,
}

impl FilterConfig {
    pub fn new(tiers: Vec<Tier>) -> Self {
        Self { tiers }
    }

    /// A filter with no tiers: every feature is transparent
    pub fn empty() -> Self {
        Self { tiers: Vec::new() }
    }

    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn tier(&self, name: &str) -> Option<&Tier> {
        self.tiers.iter().find(|t| t.name == name)
    }

    /// Returns `false` if no such tier exists
    pub fn set_tier_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.tiers.iter_mut().find(|t| t.name == name) {
            Some(tier) => {
                tier.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Returns `false` if no such tier or bracket exists
    pub fn set_bracket_enabled(&mut self, tier: &str, index: usize, enabled: bool) -> bool {
        let bracket = self
            .tiers
            .iter_mut()
            .find(|t| t.name == tier)
            .and_then(|t| t.brackets.get_mut(index));
        match bracket {
            Some(bracket) => {
                bracket.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Enabled brackets of enabled tiers, in priority order, with their tier
    pub fn enabled_brackets(&self) -> impl Iterator<Item = (&Tier, &Bracket)> {
        self.tiers
            .iter()
            .filter(|tier| tier.enabled)
            .flat_map(|tier| {
                tier.brackets
                    .iter()
                    .filter(|b| b.enabled)
                    .map(move |b| (tier, b))
            })
    }

    pub fn validate(&self) -> Vec<FilterWarning> {
        let mut warnings = Vec::new();
        for tier in &self.tiers {
            for (index, bracket) in tier.brackets.iter().enumerate() {
                if !bracket.has_usable_bounds() {
                    warnings.push(FilterWarning::NonFiniteBound {
                        tier: tier.name.clone(),
                        index,
                    });
                } else if bracket.min > bracket.upper() {
                    warnings.push(FilterWarning::InvertedRange {
                        tier: tier.name.clone(),
                        index,
                        min: bracket.min,
                        max: bracket.upper(),
                    });
                }
            }
            for (first, a) in tier.brackets.iter().enumerate() {
                for (offset, b) in tier.brackets[first + 1..].iter().enumerate() {
                    // Shared endpoints are how adjacent brackets are written
                    if a.min < b.upper() && b.min < a.upper() {
                        warnings.push(FilterWarning::Overlap {
                            tier: tier.name.clone(),
                            first,
                            second: first + 1 + offset,
                        });
                    }
                }
            }
        }
        warnings
    }
}

fn default_brackets() -> Vec<Bracket> {
    let ranges: [(f64, Option<f64>, &str); 6] = [
        (1500.0, None, "1500+"),
        (1250.0, Some(1500.0), "1250-1500"),
        (1000.0, Some(1250.0), "1000-1250"),
        (750.0, Some(1000.0), "750-1000"),
        (500.0, Some(750.0), "500-750"),
        (0.0, Some(500.0), "0-500"),
    ];
    ranges
        .iter()
        .zip(DEFAULT_PALETTE.iter())
        .map(|(&(min, max, label), color)| {
            let bracket = Bracket::new(min, max, *color).with_label(label);
            if min == 0.0 {
                bracket.disabled()
            } else {
                bracket
            }
        })
        .collect()
}

impl Default for FilterConfig {
    /// Household-income tiers, the higher income band taking priority
    fn default() -> Self {
        Self::new(vec![
            Tier::new("income_500k", "kids_500k", default_brackets()),
            Tier::new("income_250k", "kids_250k", default_brackets()),
        ])
    }
}
