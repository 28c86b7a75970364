//! Scene builders shared by the criterion and iai benchmarks.

use anyhow::Result;
use glam::Vec2;
use rein_physics2d::{moment_for_box, moment_for_circle, Body, Shape, Space, SpaceConfig};

pub const DT: f32 = 1.0 / 60.0;

/// Space with a static floor segment and walls enclosing `x` in `[-50, 50]`.
pub fn setup_arena() -> Result<Space> {
    let mut space = Space::new(SpaceConfig::default());
    let ground = space.static_body();
    for (a, b) in [
        (Vec2::new(-50.0, 0.0), Vec2::new(50.0, 0.0)),
        (Vec2::new(-50.0, 0.0), Vec2::new(-50.0, 200.0)),
        (Vec2::new(50.0, 0.0), Vec2::new(50.0, 200.0)),
    ] {
        space.add_shape(Shape::segment(ground, a, b, 0.0)?.with_friction(1.0))?;
    }
    Ok(space)
}

pub fn add_ball(space: &mut Space, position: Vec2, radius: f32) -> Result<()> {
    let body = space.add_body(
        Body::new(1.0, moment_for_circle(1.0, 0.0, radius, Vec2::ZERO))?.with_position(position),
    );
    space.add_shape(Shape::circle(body, radius, Vec2::ZERO)?.with_friction(0.7))?;
    Ok(())
}

pub fn add_box(space: &mut Space, position: Vec2, size: f32) -> Result<()> {
    let body = space.add_body(
        Body::new(1.0, moment_for_box(1.0, size, size))?.with_position(position),
    );
    space.add_shape(Shape::new_box(body, size, size).with_friction(0.7))?;
    Ok(())
}

/// `n` balls on a tight grid so neighbours overlap.
pub fn setup_ball_space(n: usize) -> Result<Space> {
    let mut space = Space::new(SpaceConfig::default());
    let cols = (n as f32).sqrt().ceil() as usize;
    for i in 0..n {
        let x = (i % cols) as f32 * 0.9;
        let y = (i / cols) as f32 * 0.9;
        add_ball(&mut space, Vec2::new(x, y), 0.5)?;
    }
    space.update_bounding_boxes();
    Ok(space)
}

/// Alternating balls and boxes on a tight grid.
pub fn setup_mixed_space(n: usize) -> Result<Space> {
    let mut space = Space::new(SpaceConfig::default());
    let cols = (n as f32).sqrt().ceil() as usize;
    for i in 0..n {
        let position = Vec2::new((i % cols) as f32 * 0.9, (i / cols) as f32 * 0.9);
        if i % 2 == 0 {
            add_ball(&mut space, position, 0.5)?;
        } else {
            add_box(&mut space, position, 1.0)?;
        }
    }
    space.update_bounding_boxes();
    Ok(space)
}

/// `n` balls spread far apart, so the broadphase finds nothing.
pub fn setup_sparse_space(n: usize) -> Result<Space> {
    let mut space = Space::new(SpaceConfig::default());
    let cols = (n as f32).sqrt().ceil() as usize;
    for i in 0..n {
        let position = Vec2::new((i % cols) as f32 * 5.0, (i / cols) as f32 * 5.0);
        add_ball(&mut space, position, 0.5)?;
    }
    space.update_bounding_boxes();
    Ok(space)
}

/// `n` bodies dropped into the arena from stacked rows.
pub fn setup_scene(n: usize) -> Result<Space> {
    let mut space = setup_arena()?;
    for i in 0..n {
        let x = (i % 40) as f32 * 2.2 - 44.0;
        let y = 1.0 + (i / 40) as f32 * 1.5;
        if i % 3 == 0 {
            add_box(&mut space, Vec2::new(x, y), 1.0)?;
        } else {
            add_ball(&mut space, Vec2::new(x, y), 0.5)?;
        }
    }
    Ok(space)
}

/// A settled box pyramid with `rows` rows.
pub fn setup_pyramid(rows: usize) -> Result<Space> {
    let mut space = setup_arena()?;
    for row in 0..rows {
        let count = rows - row;
        for i in 0..count {
            let x = (i as f32 - count as f32 / 2.0) * 1.05;
            add_box(&mut space, Vec2::new(x, 0.5 + row as f32 * 1.0), 1.0)?;
        }
    }
    for _ in 0..60 {
        space.fixed_step(DT);
    }
    Ok(space)
}

/// Step `frames` times, dropping `spawn_per_frame` new balls every frame.
pub fn run_mass_physics(space: &mut Space, frames: usize, spawn_per_frame: usize) -> Result<()> {
    for frame in 0..frames {
        for k in 0..spawn_per_frame {
            let x = ((frame * spawn_per_frame + k) % 90) as f32 - 45.0;
            add_ball(space, Vec2::new(x, 60.0), 0.4)?;
        }
        space.fixed_step(DT);
    }
    Ok(())
}
