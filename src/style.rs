use std::fmt;
use std::str::FromStr;

/// Edge curve drawn between two flow nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeType {
    #[default]
    Bezier,
    Straight,
    Step,
    SmoothStep,
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeType::Bezier => "bezier",
            EdgeType::Straight => "straight",
            EdgeType::Step => "step",
            EdgeType::SmoothStep => "smoothstep",
        };
        f.write_str(name)
    }
}

impl FromStr for EdgeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bezier" | "default" => Ok(EdgeType::Bezier),
            "straight" => Ok(EdgeType::Straight),
            "step" => Ok(EdgeType::Step),
            "smoothstep" | "smooth-step" => Ok(EdgeType::SmoothStep),
            other => Err(anyhow::anyhow!("unknown edge type {other:?}")),
        }
    }
}

/// Range and granularity of one numeric style field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    pub step: f32,
}

impl FieldSpec {
    /// Clamp into range, then snap to the nearest step counted from `min`
    pub fn normalize(&self, value: f32) -> f32 {
        if !value.is_finite() {
            return self.default;
        }
        let clamped = value.clamp(self.min, self.max);
        let steps = ((clamped - self.min) / self.step).round();
        (self.min + steps * self.step).clamp(self.min, self.max)
    }
}

/// Presentation parameters shared by the graph and the chat log.
/// Nothing in here affects tree correctness.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    pub node_width: f32,
    pub node_height: f32,
    pub horizontal_spacing: f32,
    pub vertical_spacing: f32,
    pub font_size: f32,
    /// Multiplier of `font_size`
    pub line_height: f32,
    /// 0 hides labels entirely
    pub max_characters: usize,
    pub edge_width: f32,
    pub edge_type: EdgeType,
    pub edge_animated: bool,
}

/// Inner padding of a node, subtracted before fitting text lines
pub const NODE_PADDING: f32 = 16.0;

impl StyleConfig {
    pub const FIELDS: [FieldSpec; 8] = [
        FieldSpec { name: "node_width", min: 100.0, max: 400.0, default: 200.0, step: 10.0 },
        FieldSpec { name: "node_height", min: 40.0, max: 200.0, default: 80.0, step: 5.0 },
        FieldSpec { name: "horizontal_spacing", min: 100.0, max: 500.0, default: 250.0, step: 10.0 },
        FieldSpec { name: "vertical_spacing", min: 60.0, max: 300.0, default: 120.0, step: 10.0 },
        FieldSpec { name: "font_size", min: 8.0, max: 24.0, default: 12.0, step: 1.0 },
        FieldSpec { name: "line_height", min: 1.0, max: 2.5, default: 1.5, step: 0.1 },
        FieldSpec { name: "max_characters", min: 0.0, max: 200.0, default: 50.0, step: 5.0 },
        FieldSpec { name: "edge_width", min: 1.0, max: 10.0, default: 2.0, step: 0.5 },
    ];

    pub fn field(name: &str) -> Option<&'static FieldSpec> {
        Self::FIELDS.iter().find(|spec| spec.name == name)
    }

    /// Set a numeric field by name, normalized to its spec.
    /// Returns the stored value, or `None` for an unknown field.
    pub fn set(&mut self, name: &str, value: f32) -> Option<f32> {
        let value = Self::field(name)?.normalize(value);
        match name {
            "node_width" => self.node_width = value,
            "node_height" => self.node_height = value,
            "horizontal_spacing" => self.horizontal_spacing = value,
            "vertical_spacing" => self.vertical_spacing = value,
            "font_size" => self.font_size = value,
            "line_height" => self.line_height = value,
            "max_characters" => self.max_characters = value as usize,
            "edge_width" => self.edge_width = value,
            _ => return None,
        }
        Some(value)
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        let value = match name {
            "node_width" => self.node_width,
            "node_height" => self.node_height,
            "horizontal_spacing" => self.horizontal_spacing,
            "vertical_spacing" => self.vertical_spacing,
            "font_size" => self.font_size,
            "line_height" => self.line_height,
            "max_characters" => self.max_characters as f32,
            "edge_width" => self.edge_width,
            _ => return None,
        };
        Some(value)
    }

    /// Style tokens so both views size nodes the same way
    pub fn flow_css_variables(&self) -> Vec<(&'static str, String)> {
        let metrics = crate::layout::calculate_text_layout_metrics(
            self.node_height,
            self.font_size,
            self.line_height,
            NODE_PADDING,
        );
        vec![
            ("--flow-node-width", format!("{}px", self.node_width)),
            ("--flow-node-height", format!("{}px", self.node_height)),
            ("--flow-font-size", format!("{}px", self.font_size)),
            ("--flow-line-height", format!("{}", self.line_height)),
            ("--flow-edge-width", format!("{}px", self.edge_width)),
            ("--flow-max-lines", metrics.max_complete_lines.to_string()),
            ("--flow-text-height", format!("{}px", metrics.exact_text_height)),
        ]
    }
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            node_width: 200.0,
            node_height: 80.0,
            horizontal_spacing: 250.0,
            vertical_spacing: 120.0,
            font_size: 12.0,
            line_height: 1.5,
            max_characters: 50,
            edge_width: 2.0,
            edge_type: EdgeType::Bezier,
            edge_animated: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_field_specs() {
        let style = StyleConfig::default();
        for spec in StyleConfig::FIELDS {
            assert_eq!(style.get(spec.name), Some(spec.default), "{}", spec.name);
        }
    }

    #[test]
    fn set_clamps_and_snaps() {
        let mut style = StyleConfig::default();
        assert_eq!(style.set("node_width", 1000.0), Some(400.0));
        assert_eq!(style.set("font_size", 13.4), Some(13.0));
        assert_eq!(style.set("max_characters", -3.0), Some(0.0));
        assert_eq!(style.max_characters, 0);
        let line_height = style.set("line_height", 1.74).unwrap();
        assert!((line_height - 1.7).abs() < 1e-4);
        assert_eq!(style.set("edge_width", f32::NAN), Some(2.0));
        assert_eq!(style.set("nope", 1.0), None);
    }

    #[test]
    fn edge_type_parses() {
        assert_eq!("SmoothStep".parse::<EdgeType>().unwrap(), EdgeType::SmoothStep);
        assert_eq!("straight".parse::<EdgeType>().unwrap(), EdgeType::Straight);
        assert!("wiggly".parse::<EdgeType>().is_err());
    }

    #[test]
    fn css_variables_carry_text_metrics() {
        let vars = StyleConfig::default().flow_css_variables();
        let lookup = |key: &str| {
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.clone())
        };
        assert_eq!(lookup("--flow-node-width").as_deref(), Some("200px"));
        // (80 - 16) / (12 * 1.5) = 3.55 -> 3 lines of 18px
        assert_eq!(lookup("--flow-max-lines").as_deref(), Some("3"));
        assert_eq!(lookup("--flow-text-height").as_deref(), Some("54px"));
    }
}
