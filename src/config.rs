use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::error::ShadowError;
use crate::render::{check_target_size, DEFAULT_MAX_TARGET_SIZE};

/// How many depth comparisons contribute to a fragment's visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShadowMode {
    /// One comparison at the fragment's own texel.
    Hard,
    /// Average of the 3x3 texel neighbourhood.
    #[default]
    Pcf,
}

impl ShadowMode {
    /// Half-width of the sampling kernel in texels.
    pub fn kernel_radius(self) -> i32 {
        match self {
            Self::Hard => 0,
            Self::Pcf => 1,
        }
    }

    pub fn sample_count(self) -> u32 {
        let side = (2 * self.kernel_radius() + 1) as u32;
        side * side
    }
}

impl FromStr for ShadowMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "hard" => Ok(Self::Hard),
            "pcf" | "soft" => Ok(Self::Pcf),
            other => Err(anyhow!("unknown shadow mode `{other}` (expected hard or pcf)")),
        }
    }
}

impl fmt::Display for ShadowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hard => "hard",
            Self::Pcf => "pcf",
        })
    }
}

/// Filtering applied when the camera pass samples the depth target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextureFilter {
    #[default]
    Nearest,
    Linear,
}

impl FromStr for TextureFilter {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "linear" => Ok(Self::Linear),
            other => Err(anyhow!(
                "unknown texture filter `{other}` (expected nearest or linear)"
            )),
        }
    }
}

impl fmt::Display for TextureFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nearest => "nearest",
            Self::Linear => "linear",
        })
    }
}

/// How the occluder's rotation advances between frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RotationCadence {
    /// `rotation_step` radians every frame, whatever the frame time.
    #[default]
    PerFrame,
    /// `rotation_step` radians per `1 / reference_fps` seconds of `dt`.
    PerSecond { reference_fps: f32 },
}

/// Orthographic volume seen by the directional light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightBounds {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for LightBounds {
    fn default() -> Self {
        Self {
            left: -40.0,
            right: 40.0,
            bottom: -40.0,
            top: 40.0,
            near: -40.0,
            far: 80.0,
        }
    }
}

/// Placement of the directional light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightRig {
    pub bounds: LightBounds,
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            bounds: LightBounds::default(),
            eye: Vec3::new(0.0, 2.0, -3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
        }
    }
}

/// Orbiting viewer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewerRig {
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    pub distance: f32,
    pub initial_pitch: f32,
    pub initial_yaw: f32,
    /// Pixels of drag per radian of rotation.
    pub drag_divisor: f32,
}

impl Default for ViewerRig {
    fn default() -> Self {
        Self {
            fov_y: PI / 3.0,
            near: 0.01,
            far: 900.0,
            distance: 45.0,
            initial_pitch: PI / 20.0,
            initial_yaw: 0.0,
            drag_divisor: 50.0,
        }
    }
}

/// Everything that parametrizes the two passes and the scene around them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub mode: ShadowMode,
    pub filter: TextureFilter,
    /// Side length of the square depth target in texels.
    pub resolution: u32,
    /// Subtracted from a fragment's light-space depth before comparison.
    pub acne_bias: f32,
    pub viewport: (u32, u32),
    pub clear_color: Vec3,
    pub floor_color: Vec3,
    pub occluder_color: Vec3,
    pub occluder_offset: Vec3,
    pub rotation_step: f32,
    pub cadence: RotationCadence,
    pub light: LightRig,
    pub viewer: ViewerRig,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            mode: ShadowMode::Pcf,
            filter: TextureFilter::Nearest,
            resolution: 1024,
            acne_bias: 0.007,
            viewport: (500, 500),
            clear_color: Vec3::splat(0.98),
            floor_color: Vec3::splat(0.6),
            occluder_color: Vec3::new(0.36, 0.66, 0.8),
            occluder_offset: Vec3::new(0.0, 0.0, -3.0),
            rotation_step: 0.01,
            cadence: RotationCadence::PerFrame,
            light: LightRig::default(),
            viewer: ViewerRig::default(),
        }
    }
}

impl ShadowConfig {
    /// Checks value ranges that would otherwise surface as GPU faults.
    pub fn validate(&self) -> Result<(), ShadowError> {
        let fail = |msg: String| Err(ShadowError::Config(msg));
        if self.resolution == 0 {
            return Err(ShadowError::target(0, 0, "depth target resolution must be non-zero"));
        }
        if self.viewport.0 == 0 || self.viewport.1 == 0 {
            return fail(format!(
                "viewport {}x{} has zero area",
                self.viewport.0, self.viewport.1
            ));
        }
        check_target_size(self.viewport.0, self.viewport.1, DEFAULT_MAX_TARGET_SIZE)?;
        if !(self.acne_bias.is_finite() && self.acne_bias >= 0.0) {
            return fail(format!("acne bias {} must be a non-negative number", self.acne_bias));
        }
        let b = &self.light.bounds;
        if b.left >= b.right || b.bottom >= b.top || b.near >= b.far {
            return fail(format!("light bounds {b:?} are empty"));
        }
        if (self.light.eye - self.light.target).length_squared() <= f32::EPSILON {
            return fail("light eye and target coincide".to_string());
        }
        let v = &self.viewer;
        if !(v.fov_y > 0.0 && v.fov_y < PI) || v.near <= 0.0 || v.far <= v.near {
            return fail(format!(
                "viewer projection fov={} near={} far={} is degenerate",
                v.fov_y, v.near, v.far
            ));
        }
        if v.drag_divisor <= 0.0 {
            return fail(format!("drag divisor {} must be positive", v.drag_divisor));
        }
        if let RotationCadence::PerSecond { reference_fps } = self.cadence {
            if reference_fps <= 0.0 {
                return fail(format!("reference fps {reference_fps} must be positive"));
            }
        }
        Ok(())
    }

    /// Reads overrides from an XML scene description.
    ///
    /// Every element is optional; anything missing keeps its default.
    ///
    /// ```xml
    /// <shadow-scene>
    ///     <mode>pcf</mode>
    ///     <filter>nearest</filter>
    ///     <resolution>1024</resolution>
    ///     <light>
    ///         <bounds>-40 40 -40 40 -40 80</bounds>
    ///         <eye>0 2 -3</eye>
    ///     </light>
    /// </shadow-scene>
    /// ```
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root = document.root_element();
        if !root.has_tag_name("shadow-scene") {
            return Err(anyhow!(
                "expected <shadow-scene> root element, found <{}>",
                root.tag_name().name()
            ));
        }

        let mut config = Self::default();
        if let Some(mode) = optional_text(&root, "mode") {
            config.mode = mode.parse()?;
        }
        if let Some(filter) = optional_text(&root, "filter") {
            config.filter = filter.parse()?;
        }
        config.resolution = parse_number(optional_text(&root, "resolution"), config.resolution)
            .context("invalid <resolution>")?;
        config.acne_bias = parse_number(optional_text(&root, "acne-bias"), config.acne_bias)
            .context("invalid <acne-bias>")?;
        if let Some(viewport) = optional_text(&root, "viewport") {
            let [w, h] = parse_numbers::<u32, 2>(&viewport).context("invalid <viewport>")?;
            config.viewport = (w, h);
        }
        config.clear_color = parse_vec3(optional_text(&root, "clear-color"), config.clear_color)
            .context("invalid <clear-color>")?;
        config.floor_color = parse_vec3(optional_text(&root, "floor-color"), config.floor_color)
            .context("invalid <floor-color>")?;

        if let Some(occluder) = child(&root, "occluder") {
            config.occluder_color = parse_vec3(optional_text(&occluder, "color"), config.occluder_color)
                .context("invalid occluder <color>")?;
            config.occluder_offset =
                parse_vec3(optional_text(&occluder, "offset"), config.occluder_offset)
                    .context("invalid occluder <offset>")?;
            config.rotation_step =
                parse_number(optional_text(&occluder, "rotation-step"), config.rotation_step)
                    .context("invalid occluder <rotation-step>")?;
            if let Some(fps) = optional_text(&occluder, "reference-fps") {
                let reference_fps = fps
                    .parse::<f32>()
                    .map_err(|err| anyhow!("invalid occluder <reference-fps>: {err}"))?;
                config.cadence = RotationCadence::PerSecond { reference_fps };
            }
        }

        if let Some(light) = child(&root, "light") {
            if let Some(bounds) = optional_text(&light, "bounds") {
                let [left, right, bottom, top, near, far] =
                    parse_numbers::<f32, 6>(&bounds).context("invalid light <bounds>")?;
                config.light.bounds = LightBounds {
                    left,
                    right,
                    bottom,
                    top,
                    near,
                    far,
                };
            }
            config.light.eye = parse_vec3(optional_text(&light, "eye"), config.light.eye)
                .context("invalid light <eye>")?;
            config.light.target = parse_vec3(optional_text(&light, "target"), config.light.target)
                .context("invalid light <target>")?;
        }

        if let Some(viewer) = child(&root, "viewer") {
            let v = &mut config.viewer;
            v.fov_y = parse_number(optional_text(&viewer, "fov"), v.fov_y)
                .context("invalid viewer <fov>")?;
            v.distance = parse_number(optional_text(&viewer, "distance"), v.distance)
                .context("invalid viewer <distance>")?;
            v.initial_pitch = parse_number(optional_text(&viewer, "pitch"), v.initial_pitch)
                .context("invalid viewer <pitch>")?;
            v.initial_yaw = parse_number(optional_text(&viewer, "yaw"), v.initial_yaw)
                .context("invalid viewer <yaw>")?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(tag))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_number<T>(value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match value {
        Some(value) => value
            .parse::<T>()
            .map_err(|err| anyhow!("failed to parse `{value}`: {err}")),
        None => Ok(default),
    }
}

fn parse_numbers<T, const N: usize>(value: &str) -> Result<[T; N]>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let numbers = value
        .split_whitespace()
        .map(|component| {
            component
                .parse::<T>()
                .map_err(|err| anyhow!("failed to parse `{component}`: {err}"))
        })
        .collect::<Result<Vec<_>>>()?;
    numbers
        .try_into()
        .map_err(|numbers: Vec<T>| anyhow!("expected {N} numbers, found {}", numbers.len()))
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => Ok(Vec3::from_array(parse_numbers::<f32, 3>(&value)?)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    <shadow-scene>
        <mode>hard</mode>
        <filter>linear</filter>
        <resolution>512</resolution>
        <acne-bias>0.01</acne-bias>
        <occluder>
            <offset>0 1 -2</offset>
            <rotation-step>0.02</rotation-step>
            <reference-fps>60</reference-fps>
        </occluder>
        <light>
            <bounds>-20 20 -20 20 -10 50</bounds>
            <eye>1 4 -2</eye>
        </light>
        <viewer>
            <distance>30</distance>
        </viewer>
    </shadow-scene>
    "#;

    #[test]
    fn parse_overrides_defaults() {
        let config = ShadowConfig::from_xml(SAMPLE).unwrap();
        assert_eq!(config.mode, ShadowMode::Hard);
        assert_eq!(config.filter, TextureFilter::Linear);
        assert_eq!(config.resolution, 512);
        assert_eq!(config.acne_bias, 0.01);
        assert_eq!(config.occluder_offset, Vec3::new(0.0, 1.0, -2.0));
        assert_eq!(config.rotation_step, 0.02);
        assert_eq!(
            config.cadence,
            RotationCadence::PerSecond { reference_fps: 60.0 }
        );
        assert_eq!(config.light.bounds.near, -10.0);
        assert_eq!(config.light.eye, Vec3::new(1.0, 4.0, -2.0));
        assert_eq!(config.viewer.distance, 30.0);
        assert_eq!(config.viewer.fov_y, ViewerRig::default().fov_y);
    }

    #[test]
    fn empty_scene_matches_defaults() {
        let config = ShadowConfig::from_xml("<shadow-scene/>").unwrap();
        assert_eq!(config, ShadowConfig::default());
    }

    #[test]
    fn rejects_wrong_root_and_bad_values() {
        assert!(ShadowConfig::from_xml("<scene/>").is_err());
        assert!(ShadowConfig::from_xml("<shadow-scene><mode>blurry</mode></shadow-scene>").is_err());
        assert!(
            ShadowConfig::from_xml("<shadow-scene><light><bounds>1 2 3</bounds></light></shadow-scene>")
                .is_err()
        );
        assert!(
            ShadowConfig::from_xml("<shadow-scene><resolution>0</resolution></shadow-scene>").is_err()
        );
    }

    #[test]
    fn viewport_must_be_whole_and_bounded() {
        assert!(
            ShadowConfig::from_xml("<shadow-scene><viewport>640.5 480</viewport></shadow-scene>")
                .is_err()
        );
        let err = ShadowConfig::from_xml("<shadow-scene><viewport>1e12 1e12</viewport></shadow-scene>")
            .unwrap_err();
        assert!(format!("{err:#}").contains("invalid <viewport>"));

        let config = ShadowConfig {
            viewport: (DEFAULT_MAX_TARGET_SIZE + 1, 16),
            ..ShadowConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ShadowError::TargetCreation { height: 16, .. })
        ));
        let config = ShadowConfig {
            viewport: (DEFAULT_MAX_TARGET_SIZE, DEFAULT_MAX_TARGET_SIZE),
            ..ShadowConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_catches_degenerate_light() {
        let mut config = ShadowConfig::default();
        config.light.bounds.far = config.light.bounds.near;
        assert!(matches!(config.validate(), Err(ShadowError::Config(_))));
    }

    #[test]
    fn mode_kernels() {
        assert_eq!(ShadowMode::Hard.sample_count(), 1);
        assert_eq!(ShadowMode::Pcf.sample_count(), 9);
        assert_eq!("PCF".parse::<ShadowMode>().unwrap(), ShadowMode::Pcf);
        assert_eq!("linear".parse::<TextureFilter>().unwrap(), TextureFilter::Linear);
    }
}
