//! Per-tile fill styling
//!
//! The enabled brackets of a [`FilterConfig`] compile into a [`PaintRule`]:
//! an ordered list of cases where the first match colors the feature and
//! no match leaves it transparent. The rule is pushed to the render surface
//! as a `case` expression on each tile's `fill-color`.

use super::color::Color;
use super::filter::FilterConfig;
use crate::core::constants::TRANSPARENT;
use crate::data::geojson::{GeoJson, GeoJsonFeature};
use crate::render::RenderAdapter;
use crate::tiles::types::{RenderHandles, TileId};
use crate::{Error, Result};
use serde_json::{json, Value};

const FILL_COLOR: &str = "fill-color";

#[derive(Debug, Clone, PartialEq)]
pub struct PaintCase {
    pub property: String,
    pub min: f64,
    pub max: f64,
    pub color: Color,
}

impl PaintCase {
    fn matches(&self, feature: &GeoJsonFeature) -> bool {
        feature
            .numeric_property(&self.property)
            .map(|v| v >= self.min && v <= self.max)
            .unwrap_or(false)
    }

    fn condition(&self) -> Value {
        let value = json!(["to-number", ["get", self.property]]);
        let mut all = vec![
            json!("all"),
            json!(["has", self.property]),
            json!([">=", value, self.min]),
        ];
        if self.max.is_finite() {
            all.push(json!(["<=", value, self.max]));
        }
        Value::Array(all)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaintRule {
    pub cases: Vec<PaintCase>,
}

impl PaintRule {
    pub fn from_filter(filter: &FilterConfig) -> Self {
        for warning in filter.validate() {
            log::warn!("filter: {}", warning);
        }

        let cases = filter
            .tiers
            .iter()
            .filter(|tier| tier.enabled)
            .flat_map(|tier| {
                tier.brackets
                    .iter()
                    .enumerate()
                    // Unusable bounds would serialise as null in the expression
                    .filter(|(_, b)| b.enabled && b.has_usable_bounds())
                    .map(move |(index, bracket)| PaintCase {
                        property: tier.property.clone(),
                        min: bracket.min,
                        max: bracket.upper(),
                        color: bracket.resolved_color(index),
                    })
            })
            .collect();
        Self { cases }
    }

    /// Color of the first matching case, transparent if none match
    pub fn evaluate(&self, feature: &GeoJsonFeature) -> Color {
        self.cases
            .iter()
            .find(|case| case.matches(feature))
            .map(|case| case.color)
            .unwrap_or_else(Color::transparent)
    }

    /// The rule as a map-style `fill-color` expression
    pub fn to_expression(&self) -> Value {
        if self.cases.is_empty() {
            return json!(["literal", TRANSPARENT]);
        }
        let mut expr = vec![json!("case")];
        for case in &self.cases {
            expr.push(case.condition());
            expr.push(json!(case.color.to_css()));
        }
        expr.push(json!(TRANSPARENT));
        Value::Array(expr)
    }
}

#[derive(Debug)]
pub struct StyleApplier {
    filter: FilterConfig,
    rule: PaintRule,
    expression: Value,
}

impl StyleApplier {
    pub fn new(filter: FilterConfig) -> Self {
        let rule = PaintRule::from_filter(&filter);
        let expression = rule.to_expression();
        Self {
            filter,
            rule,
            expression,
        }
    }

    pub fn filter(&self) -> &FilterConfig {
        &self.filter
    }

    pub fn rule(&self) -> &PaintRule {
        &self.rule
    }

    pub fn expression(&self) -> &Value {
        &self.expression
    }

    /// Replaces the filter without touching any tile
    pub fn set_filter(&mut self, filter: FilterConfig) {
        self.rule = PaintRule::from_filter(&filter);
        self.expression = self.rule.to_expression();
        self.filter = filter;
    }

    /// Assigns the current rule to one tile's layer
    pub fn apply(&self, id: &TileId, layer_id: &str, surface: &mut dyn RenderAdapter) -> Result<()> {
        if !surface.has_layer(layer_id) {
            return Err(Error::Registration {
                id: id.clone(),
                reason: format!("layer {} is not registered", layer_id),
            });
        }
        surface
            .set_paint_property(layer_id, FILL_COLOR, self.expression.clone())
            .map_err(|e| Error::Registration {
                id: id.clone(),
                reason: e.to_string(),
            })
    }

    /// Installs `filter` and re-styles every given loaded tile.
    ///
    /// Returns how many tiles were re-styled. Failures are logged per tile and
    /// never stop the others.
    pub fn reapply_all<'a>(
        &mut self,
        filter: FilterConfig,
        tiles: impl IntoIterator<Item = (&'a TileId, &'a RenderHandles)>,
        surface: &mut dyn RenderAdapter,
    ) -> usize {
        self.set_filter(filter);
        let mut applied = 0;
        for (id, handles) in tiles {
            match self.apply(id, &handles.layer_id, surface) {
                Ok(()) => applied += 1,
                Err(e) => log::warn!("restyling tile {} failed: {}", id, e),
            }
        }
        log::debug!("filter change restyled {} tiles", applied);
        applied
    }

    pub fn color_for(&self, feature: &GeoJsonFeature) -> Color {
        self.rule.evaluate(feature)
    }

    /// Fill color of every feature in a tile, in feature order
    pub fn feature_colors(&self, data: &GeoJson) -> Vec<Color> {
        data.features().iter().map(|f| self.color_for(f)).collect()
    }
}

impl Default for StyleApplier {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}
