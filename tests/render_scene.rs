use glam::{Vec3, Vec4Swizzles};
use once_cell::sync::Lazy;

use shadow_mapping::mesh::{cuboid, floor_quad};
use shadow_mapping::render::PassTarget;
use shadow_mapping::shadow::shadow_coord;
use shadow_mapping::{Mesh, MeshSource, Scene, ShadowConfig, ShadowMode, SoftwareDevice};

const VIEWPORT: u32 = 160;

/// Floor plus a 4x4x4 block hovering on the light ray through the origin.
struct HoveringBlock;

impl MeshSource for HoveringBlock {
    fn floor(&self) -> Mesh {
        floor_quad(30.0)
    }

    fn occluder(&self) -> Mesh {
        cuboid("block", Vec3::ZERO, Vec3::splat(2.0))
    }
}

fn config(mode: ShadowMode) -> ShadowConfig {
    ShadowConfig {
        mode,
        resolution: 512,
        viewport: (VIEWPORT, VIEWPORT),
        // The light looks from (0, 2, -3) at the origin.
        occluder_offset: Vec3::new(0.0, 4.0, -6.0),
        rotation_step: 0.0,
        ..ShadowConfig::default()
    }
}

fn render(mode: ShadowMode) -> (SoftwareDevice, Scene) {
    let mut device = SoftwareDevice::new(VIEWPORT, VIEWPORT);
    let mut scene = Scene::new(&mut device, &HoveringBlock, config(mode)).expect("scene builds");
    scene.run_frame(&mut device, 1.0 / 60.0);
    (device, scene)
}

static PCF_FRAME: Lazy<(SoftwareDevice, Scene)> = Lazy::new(|| render(ShadowMode::Pcf));
static HARD_FRAME: Lazy<(SoftwareDevice, Scene)> = Lazy::new(|| render(ShadowMode::Hard));

/// Screen pixel (bottom-up rows) covering `world` for the scene's viewer.
fn pixel_of(scene: &Scene, world: Vec3) -> (u32, u32) {
    let viewer = scene.transforms().viewer();
    let clip = viewer.projection * viewer.view * world.extend(1.0);
    let ndc = clip.xyz() / clip.w;
    (
        ((ndc.x * 0.5 + 0.5) * VIEWPORT as f32) as u32,
        ((ndc.y * 0.5 + 0.5) * VIEWPORT as f32) as u32,
    )
}

fn screen_red(device: &SoftwareDevice, (x, y): (u32, u32)) -> u8 {
    device.read_pixel(PassTarget::Screen, x, y).expect("pixel on screen")[0]
}

#[test]
fn floor_under_the_block_is_shadowed() {
    let (device, scene) = &*PCF_FRAME;
    let shadowed = screen_red(device, pixel_of(scene, Vec3::ZERO));
    let lit = screen_red(device, pixel_of(scene, Vec3::new(8.0, 0.0, 10.0)));
    assert!(shadowed < 20, "shadowed floor is {shadowed}");
    // Unshadowed floor shows its full 0.6 gray.
    assert!((150..=156).contains(&lit), "lit floor is {lit}");
}

#[test]
fn depth_map_holds_the_block_in_front_of_the_floor() {
    let (device, scene) = &*PCF_FRAME;
    let light = scene.transforms().light();
    let coord = shadow_coord(light.projection, light.view, Vec3::ZERO);
    let resolution = scene.config().resolution as f32;
    let texel = (coord.truncate() * resolution).floor();
    let stored = device
        .read_depth(scene.shadow_map(), texel.x as u32, texel.y as u32)
        .expect("texel inside the map");
    assert!(stored < coord.z - 0.01, "stored {stored} vs floor {}", coord.z);

    // Far outside the floor nothing was drawn, so the clear value remains.
    assert_eq!(device.read_depth(scene.shadow_map(), 0, 0), Some(1.0));
}

#[test]
fn hard_shadows_only_produce_full_or_zero_light() {
    let (device, _) = &*HARD_FRAME;
    // Clear, lit floor, lit block and fully shadowed surfaces.
    let allowed = [0u8, 92, 153, 250];
    for y in 0..VIEWPORT {
        for x in 0..VIEWPORT {
            let red = screen_red(device, (x, y));
            assert!(allowed.contains(&red), "pixel ({x}, {y}) has red {red}");
        }
    }
}

#[test]
fn pcf_softens_the_shadow_boundary() {
    let (device, _) = &*PCF_FRAME;
    let partial = (0..VIEWPORT)
        .flat_map(|y| (0..VIEWPORT).map(move |x| (x, y)))
        .map(|pixel| screen_red(device, pixel))
        .filter(|red| (1..150).contains(red) && *red != 92)
        .count();
    assert!(partial > 0, "expected partially lit pixels along the edge");
}

#[test]
fn rendering_is_deterministic() {
    let (again, _) = render(ShadowMode::Pcf);
    let (first, _) = &*PCF_FRAME;
    assert_eq!(
        first.read_target(PassTarget::Screen),
        again.read_target(PassTarget::Screen)
    );
}
