//! End-to-end simulation tests driving a whole world through many steps.

use std::cell::Cell;
use std::rc::Rc;

use glam::Vec2;
use impulse2d::dynamics::joints::linear_stiffness;
use impulse2d::prelude::*;
use impulse2d::settings::LINEAR_SLOP;

const DT: f32 = 1.0 / 60.0;

fn step_n(world: &mut World, n: usize) {
    for _ in 0..n {
        world.step(DT, 8, 3);
    }
}

/// A 100 x 20 ground slab whose top edge lies at y = 0.
fn create_ground(world: &mut World) -> BodyHandle {
    let ground = world.create_body(BodyDef::static_at(Vec2::new(0.0, -10.0)));
    world
        .create_fixture(ground, FixtureDef::new(PolygonShape::rect(50.0, 10.0)))
        .unwrap();
    ground
}

#[test]
fn falling_box_settles_on_ground_and_sleeps() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    create_ground(&mut world);

    let body = world.create_body(BodyDef::dynamic_at(Vec2::new(0.0, 4.0)));
    world
        .create_fixture(
            body,
            FixtureDef::new(PolygonShape::rect(1.0, 1.0)).with_density(1.0),
        )
        .unwrap();

    step_n(&mut world, 120);

    let position = world.body(body).position();
    assert!(
        (position.y - 1.0).abs() < 0.02,
        "box should rest with its bottom on the ground, y = {}",
        position.y
    );
    assert!(world.body(body).linear_velocity().length() < 0.05);

    // Half a second of stillness puts the island to sleep.
    step_n(&mut world, 300);
    assert!(!world.body(body).is_awake());
}

#[test]
fn strong_damping_stops_body_in_one_step() {
    let mut world = World::new(Vec2::ZERO);

    // h * damping = 2, so the damping factor clamps to zero: one step
    // kills the velocity outright instead of reversing it.
    let body = world.create_body(BodyDef {
        linear_damping: 120.0,
        ..BodyDef::dynamic_at(Vec2::ZERO).with_linear_velocity(Vec2::new(10.0, 0.0))
    });
    world
        .create_fixture(
            body,
            FixtureDef::new(CircleShape::new(0.5).unwrap()).with_density(1.0),
        )
        .unwrap();

    world.step(DT, 8, 3);
    assert_eq!(world.body(body).linear_velocity().x, 0.0);

    // Below the clamp the factor is the plain linear form 1 - h * damping.
    let slow = world.create_body(BodyDef {
        linear_damping: 30.0,
        ..BodyDef::dynamic_at(Vec2::new(10.0, 0.0)).with_linear_velocity(Vec2::new(10.0, 0.0))
    });
    world
        .create_fixture(
            slow,
            FixtureDef::new(CircleShape::new(0.5).unwrap()).with_density(1.0),
        )
        .unwrap();

    world.step(DT, 8, 3);
    let v = world.body(slow).linear_velocity().x;
    assert!((v - 5.0).abs() < 1e-4, "expected half the velocity, got {v}");
}

#[test]
fn stack_of_boxes_stays_ordered() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    create_ground(&mut world);

    let mut boxes = Vec::new();
    for i in 0..3 {
        let body = world.create_body(BodyDef::dynamic_at(Vec2::new(
            0.0,
            0.5 + i as f32,
        )));
        world
            .create_fixture(
                body,
                FixtureDef::new(PolygonShape::rect(0.5, 0.5)).with_density(1.0),
            )
            .unwrap();
        boxes.push(body);
    }

    step_n(&mut world, 240);

    for (i, &body) in boxes.iter().enumerate() {
        let y = world.body(body).position().y;
        let expected = 0.5 + i as f32;
        assert!(
            (y - expected).abs() < 0.1,
            "box {i} drifted to y = {y}, expected ~{expected}"
        );
    }
}

#[test]
fn perfectly_elastic_ball_bounces_back_up() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    create_ground(&mut world);

    let ball = world.create_body(BodyDef::dynamic_at(Vec2::new(0.0, 3.0)));
    world
        .create_fixture(
            ball,
            FixtureDef::new(CircleShape::new(0.5).unwrap())
                .with_density(1.0)
                .with_restitution(1.0),
        )
        .unwrap();

    let mut bounced = false;
    let mut peak = 0.0f32;
    for _ in 0..300 {
        world.step(DT, 8, 3);
        let v = world.body(ball).linear_velocity();
        if v.y > 1.0 {
            bounced = true;
        }
        if bounced {
            peak = peak.max(world.body(ball).position().y);
        }
    }

    assert!(bounced, "ball never bounced");
    assert!(
        peak > 2.0,
        "restitution 1 should return most of the drop height, peak = {peak}"
    );
}

#[test]
fn bullet_does_not_tunnel_through_thin_wall() {
    let mut world = World::new(Vec2::ZERO);

    let wall = world.create_body(BodyDef::static_at(Vec2::new(10.0, 0.0)));
    world
        .create_fixture(wall, FixtureDef::new(PolygonShape::rect(0.05, 2.0)))
        .unwrap();

    // 200 m/s covers over 3 meters per step, many times the wall thickness.
    let bullet = world.create_body(
        BodyDef::dynamic_at(Vec2::ZERO)
            .with_linear_velocity(Vec2::new(200.0, 0.0))
            .bullet(),
    );
    world
        .create_fixture(
            bullet,
            FixtureDef::new(CircleShape::new(0.1).unwrap()).with_density(1.0),
        )
        .unwrap();

    for _ in 0..60 {
        world.step(DT, 8, 3);
        let x = world.body(bullet).position().x;
        assert!(x < 10.0, "bullet tunneled through the wall, x = {x}");
    }
}

#[test]
fn sensor_reports_overlap_without_collision_response() {
    struct Recorder {
        begins: Rc<Cell<usize>>,
        ends: Rc<Cell<usize>>,
    }
    impl ContactListener for Recorder {
        fn begin_contact(&mut self, _contact: &Contact) {
            self.begins.set(self.begins.get() + 1);
        }
        fn end_contact(&mut self, _contact: &Contact) {
            self.ends.set(self.ends.get() + 1);
        }
    }

    let begins = Rc::new(Cell::new(0));
    let ends = Rc::new(Cell::new(0));

    let mut world = World::new(Vec2::ZERO);
    world.set_contact_listener(Box::new(Recorder {
        begins: Rc::clone(&begins),
        ends: Rc::clone(&ends),
    }));

    let zone = world.create_body(BodyDef::static_at(Vec2::new(5.0, 0.0)));
    world
        .create_fixture(zone, FixtureDef::new(PolygonShape::rect(1.0, 1.0)).sensor())
        .unwrap();

    let probe = world.create_body(
        BodyDef::dynamic_at(Vec2::ZERO).with_linear_velocity(Vec2::new(5.0, 0.0)),
    );
    world
        .create_fixture(
            probe,
            FixtureDef::new(CircleShape::new(0.5).unwrap()).with_density(1.0),
        )
        .unwrap();

    step_n(&mut world, 150);

    assert_eq!(begins.get(), 1);
    assert_eq!(ends.get(), 1);
    // The sensor applied no impulse; the probe sailed straight through.
    assert!(world.body(probe).position().x > 8.0);
}

#[test]
fn same_negative_group_never_collides() {
    let mut world = World::new(Vec2::ZERO);

    let filter = Filter {
        group: -3,
        ..Filter::default()
    };
    for x in [0.0, 0.1] {
        let body = world.create_body(BodyDef::dynamic_at(Vec2::new(x, 0.0)));
        world
            .create_fixture(
                body,
                FixtureDef::new(CircleShape::new(0.5).unwrap())
                    .with_density(1.0)
                    .with_filter(filter),
            )
            .unwrap();
    }

    step_n(&mut world, 10);
    assert_eq!(world.contact_count(), 0);
}

#[test]
fn rigid_distance_joint_keeps_pendulum_length() {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let pivot = world.create_body(BodyDef::static_at(Vec2::ZERO));
    let bob = world.create_body(BodyDef::dynamic_at(Vec2::new(2.0, 0.0)));
    world
        .create_fixture(
            bob,
            FixtureDef::new(CircleShape::new(0.2).unwrap()).with_density(1.0),
        )
        .unwrap();

    // Anchors at the body origins, rod pinned to the initial 2 m span.
    let def = DistanceJointDef {
        length: 2.0,
        min_length: 2.0,
        max_length: 2.0,
        ..DistanceJointDef::new(pivot, bob)
    };
    let joint = world.create_joint(JointDef::Distance(def)).unwrap();

    step_n(&mut world, 120);

    let span = (world.joint_anchor_b(joint) - world.joint_anchor_a(joint)).length();
    assert!(
        (span - 2.0).abs() < 0.1,
        "rod stretched to {span}, expected 2.0"
    );
}

#[test]
fn revolute_motor_reaches_target_speed() {
    let mut world = World::new(Vec2::ZERO);

    let base = world.create_body(BodyDef::static_at(Vec2::ZERO));
    let rotor = world.create_body(BodyDef::dynamic_at(Vec2::ZERO));
    world
        .create_fixture(
            rotor,
            FixtureDef::new(PolygonShape::rect(1.0, 0.1)).with_density(1.0),
        )
        .unwrap();

    let def = RevoluteJointDef {
        enable_motor: true,
        motor_speed: 2.0,
        max_motor_torque: 100.0,
        ..RevoluteJointDef::new(base, rotor)
    };
    world.create_joint(JointDef::Revolute(def)).unwrap();

    step_n(&mut world, 60);

    let w = world.body(rotor).angular_velocity();
    assert!(
        (w - 2.0).abs() < 0.05,
        "rotor should spin at the motor speed, w = {w}"
    );
}

#[test]
fn prismatic_joint_blocks_off_axis_motion() {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let frame = world.create_body(BodyDef::static_at(Vec2::ZERO));
    let slider = world.create_body(BodyDef::dynamic_at(Vec2::new(0.0, 2.0)));
    world
        .create_fixture(
            slider,
            FixtureDef::new(PolygonShape::rect(0.5, 0.5)).with_density(1.0),
        )
        .unwrap();

    let def = PrismaticJointDef {
        local_anchor_a: Vec2::new(0.0, 2.0),
        local_anchor_b: Vec2::ZERO,
        local_axis_a: Vec2::X,
        ..PrismaticJointDef::new(frame, slider)
    };
    world.create_joint(JointDef::Prismatic(def)).unwrap();

    step_n(&mut world, 120);

    let y = world.body(slider).position().y;
    assert!(
        (y - 2.0).abs() < 0.01,
        "gravity must not pull the slider off its axis, y = {y}"
    );
}

#[test]
fn mouse_joint_drags_body_to_target() {
    let mut world = World::new(Vec2::ZERO);

    let ground = world.create_body(BodyDef::static_at(Vec2::ZERO));
    let body = world.create_body(BodyDef::dynamic_at(Vec2::ZERO));
    world
        .create_fixture(
            body,
            FixtureDef::new(PolygonShape::rect(0.5, 0.5)).with_density(1.0),
        )
        .unwrap();

    // Grab the body at its center, then drag the target away.
    let (stiffness, damping) = linear_stiffness(5.0, 0.7, world.body(ground), world.body(body));
    let def = MouseJointDef {
        max_force: 1000.0,
        stiffness,
        damping,
        ..MouseJointDef::new(ground, body, Vec2::ZERO)
    };
    let joint = world.create_joint(JointDef::Mouse(def)).unwrap();
    world.set_mouse_target(joint, Vec2::new(5.0, 0.0));

    step_n(&mut world, 180);

    let position = world.body(body).position();
    assert!(
        (position - Vec2::new(5.0, 0.0)).length() < 0.2,
        "body should settle at the target, got {position:?}"
    );
}

#[test]
fn weld_joint_carries_hanging_body() {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let base = world.create_body(BodyDef::static_at(Vec2::ZERO));
    let arm = world.create_body(BodyDef::dynamic_at(Vec2::new(2.0, 0.0)));
    world
        .create_fixture(
            arm,
            FixtureDef::new(PolygonShape::rect(1.0, 0.2)).with_density(1.0),
        )
        .unwrap();

    let def = WeldJointDef {
        local_anchor_a: Vec2::new(1.0, 0.0),
        local_anchor_b: Vec2::new(-1.0, 0.0),
        ..WeldJointDef::new(base, arm)
    };
    world.create_joint(JointDef::Weld(def)).unwrap();

    step_n(&mut world, 120);

    let position = world.body(arm).position();
    let angle = world.body(arm).angle();
    assert!(
        (position - Vec2::new(2.0, 0.0)).length() < 0.1,
        "weld should hold the arm in place, got {position:?}"
    );
    assert!(angle.abs() < 0.05, "weld should hold the angle, got {angle}");
}

#[test]
fn gear_joint_counter_rotates_coupled_wheels() {
    let mut world = World::new(Vec2::ZERO);

    let ground = world.create_body(BodyDef::static_at(Vec2::ZERO));

    let wheel_a = world.create_body(BodyDef::dynamic_at(Vec2::new(-1.0, 0.0)));
    world
        .create_fixture(
            wheel_a,
            FixtureDef::new(CircleShape::new(0.5).unwrap()).with_density(1.0),
        )
        .unwrap();
    let wheel_b = world.create_body(BodyDef::dynamic_at(Vec2::new(1.0, 0.0)));
    world
        .create_fixture(
            wheel_b,
            FixtureDef::new(CircleShape::new(0.5).unwrap()).with_density(1.0),
        )
        .unwrap();

    let rev_a = RevoluteJointDef {
        enable_motor: true,
        motor_speed: 2.0,
        max_motor_torque: 100.0,
        local_anchor_a: Vec2::new(-1.0, 0.0),
        ..RevoluteJointDef::new(ground, wheel_a)
    };
    let rev_b = RevoluteJointDef {
        local_anchor_a: Vec2::new(1.0, 0.0),
        ..RevoluteJointDef::new(ground, wheel_b)
    };
    let joint_a = world.create_joint(JointDef::Revolute(rev_a)).unwrap();
    let joint_b = world.create_joint(JointDef::Revolute(rev_b)).unwrap();

    let gear = GearJointDef::new(joint_a, joint_b);
    world.create_joint(JointDef::Gear(gear)).unwrap();

    step_n(&mut world, 60);

    let w_a = world.body(wheel_a).angular_velocity();
    let w_b = world.body(wheel_b).angular_velocity();
    assert!((w_a - 2.0).abs() < 0.1, "driven wheel speed, w_a = {w_a}");
    assert!(
        (w_b + 2.0).abs() < 0.1,
        "ratio 1 gear should counter-rotate, w_b = {w_b}"
    );
}

#[test]
fn pulley_keeps_total_rope_length() {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let heavy = world.create_body(BodyDef::dynamic_at(Vec2::new(-2.0, 0.0)));
    world
        .create_fixture(
            heavy,
            FixtureDef::new(PolygonShape::rect(0.5, 0.5)).with_density(5.0),
        )
        .unwrap();
    let light = world.create_body(BodyDef::dynamic_at(Vec2::new(2.0, 0.0)));
    world
        .create_fixture(
            light,
            FixtureDef::new(PolygonShape::rect(0.5, 0.5)).with_density(1.0),
        )
        .unwrap();

    let ground_a = Vec2::new(-2.0, 3.0);
    let ground_b = Vec2::new(2.0, 3.0);
    let def = PulleyJointDef {
        ground_anchor_a: ground_a,
        ground_anchor_b: ground_b,
        local_anchor_a: Vec2::ZERO,
        local_anchor_b: Vec2::ZERO,
        length_a: 3.0,
        length_b: 3.0,
        ratio: 1.0,
        ..PulleyJointDef::new(heavy, light)
    };
    let joint = world.create_joint(JointDef::Pulley(def)).unwrap();

    step_n(&mut world, 120);

    let length_a = (world.joint_anchor_a(joint) - ground_a).length();
    let length_b = (world.joint_anchor_b(joint) - ground_b).length();
    let total = length_a + length_b;
    assert!(
        (total - 6.0).abs() < 0.1,
        "rope length must be conserved, total = {total}"
    );
    // The heavy side sinks, the light side rises.
    assert!(world.body(heavy).position().y < world.body(light).position().y);
}

#[test]
fn friction_joint_brings_slider_to_rest() {
    let mut world = World::new(Vec2::ZERO);

    let ground = world.create_body(BodyDef::static_at(Vec2::ZERO));
    let puck = world.create_body(
        BodyDef::dynamic_at(Vec2::ZERO).with_linear_velocity(Vec2::new(5.0, 0.0)),
    );
    world
        .create_fixture(
            puck,
            FixtureDef::new(PolygonShape::rect(0.5, 0.5)).with_density(1.0),
        )
        .unwrap();

    let def = FrictionJointDef {
        max_force: 10.0,
        max_torque: 1.0,
        ..FrictionJointDef::new(ground, puck)
    };
    world.create_joint(JointDef::Friction(def)).unwrap();

    step_n(&mut world, 90);

    let speed = world.body(puck).linear_velocity().length();
    assert!(speed < 0.05, "top-down friction should stop the puck, speed = {speed}");
    // mass 1, decelerating at 10 m/s^2 from 5 m/s travels 1.25 m.
    let x = world.body(puck).position().x;
    assert!((x - 1.25).abs() < 0.2, "stopping distance off, x = {x}");
}

#[test]
fn motor_joint_tracks_its_linear_offset() {
    let mut world = World::new(Vec2::ZERO);

    let ground = world.create_body(BodyDef::static_at(Vec2::ZERO));
    let body = world.create_body(BodyDef::dynamic_at(Vec2::ZERO));
    world
        .create_fixture(
            body,
            FixtureDef::new(PolygonShape::rect(0.5, 0.5)).with_density(1.0),
        )
        .unwrap();

    let def = MotorJointDef {
        linear_offset: Vec2::new(3.0, 0.0),
        max_force: 100.0,
        max_torque: 10.0,
        ..MotorJointDef::new(ground, body)
    };
    world.create_joint(JointDef::Motor(def)).unwrap();

    step_n(&mut world, 180);

    let position = world.body(body).position();
    assert!(
        (position - Vec2::new(3.0, 0.0)).length() < 0.3,
        "motor joint should carry the body to its offset, got {position:?}"
    );
}

#[test]
fn wheel_joint_suspension_sags_on_its_axis_only() {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let chassis = world.create_body(BodyDef::static_at(Vec2::new(0.0, 2.0)));
    let wheel = world.create_body(BodyDef::dynamic_at(Vec2::new(0.0, 1.0)));
    world
        .create_fixture(
            wheel,
            FixtureDef::new(CircleShape::new(0.4).unwrap()).with_density(1.0),
        )
        .unwrap();

    let (stiffness, damping) =
        linear_stiffness(4.0, 0.7, world.body(chassis), world.body(wheel));
    let def = WheelJointDef {
        local_anchor_a: Vec2::new(0.0, -1.0),
        local_anchor_b: Vec2::ZERO,
        local_axis_a: Vec2::Y,
        stiffness,
        damping,
        ..WheelJointDef::new(chassis, wheel)
    };
    world.create_joint(JointDef::Wheel(def)).unwrap();

    step_n(&mut world, 180);

    let position = world.body(wheel).position();
    assert!(
        position.x.abs() < 0.01,
        "the spring axis is vertical, x should hold at 0, got {}",
        position.x
    );
    // Gravity stretches the spring below the rest anchor.
    assert!(position.y < 1.0);
    assert!(position.y > 0.5, "spring far too soft, y = {}", position.y);
}

#[test]
fn query_aabb_reports_only_nearby_fixtures() {
    let mut world = World::new(Vec2::ZERO);
    for x in [0.0, 5.0] {
        let body = world.create_body(BodyDef::static_at(Vec2::new(x, 0.0)));
        world
            .create_fixture(body, FixtureDef::new(PolygonShape::rect(0.5, 0.5)))
            .unwrap();
    }

    let aabb = Aabb {
        min: Vec2::new(-1.0, -1.0),
        max: Vec2::new(1.0, 1.0),
    };
    let mut hits = 0;
    world.query_aabb(&aabb, |_, _| {
        hits += 1;
        true
    });
    assert_eq!(hits, 1);
}

#[test]
fn ray_cast_finds_the_closest_fixture() {
    let mut world = World::new(Vec2::ZERO);
    for x in [3.0, 6.0] {
        let body = world.create_body(BodyDef::static_at(Vec2::new(x, 0.0)));
        world
            .create_fixture(body, FixtureDef::new(PolygonShape::rect(0.5, 0.5)))
            .unwrap();
    }

    let mut closest: Option<Vec2> = None;
    world.ray_cast(Vec2::ZERO, Vec2::new(10.0, 0.0), |_, point, _, fraction| {
        closest = Some(point);
        // Clip the ray to this hit and keep looking for nearer ones.
        fraction
    });

    let point = closest.expect("ray should hit a box");
    assert!(
        (point.x - 2.5).abs() < 0.01,
        "expected the near face of the first box, got {point:?}"
    );
}

#[test]
fn identical_worlds_stay_bitwise_identical() {
    fn build() -> (World, Vec<BodyHandle>) {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        create_ground(&mut world);

        let mut bodies = Vec::new();
        // An off-center stack plus a rolling ball, enough to exercise
        // contacts, a joint and the broad phase.
        for i in 0..4 {
            let body = world.create_body(BodyDef::dynamic_at(Vec2::new(
                0.05 * i as f32,
                0.5 + 1.1 * i as f32,
            )));
            world
                .create_fixture(
                    body,
                    FixtureDef::new(PolygonShape::rect(0.5, 0.5)).with_density(1.0),
                )
                .unwrap();
            bodies.push(body);
        }

        let ball = world.create_body(
            BodyDef::dynamic_at(Vec2::new(-5.0, 0.5)).with_linear_velocity(Vec2::new(3.0, 0.0)),
        );
        world
            .create_fixture(
                ball,
                FixtureDef::new(CircleShape::new(0.5).unwrap())
                    .with_density(1.0)
                    .with_friction(0.4),
            )
            .unwrap();
        bodies.push(ball);

        let pivot = world.create_body(BodyDef::static_at(Vec2::new(3.0, 4.0)));
        let bob = world.create_body(BodyDef::dynamic_at(Vec2::new(5.0, 4.0)));
        world
            .create_fixture(
                bob,
                FixtureDef::new(CircleShape::new(0.2).unwrap()).with_density(1.0),
            )
            .unwrap();
        world
            .create_joint(JointDef::Distance(DistanceJointDef::new(pivot, bob)))
            .unwrap();
        bodies.push(bob);

        (world, bodies)
    }

    let (mut world_a, bodies_a) = build();
    let (mut world_b, bodies_b) = build();

    step_n(&mut world_a, 120);
    step_n(&mut world_b, 120);

    // Same construction order and step count must reproduce the exact
    // same floating-point state, bit for bit.
    for (&a, &b) in bodies_a.iter().zip(&bodies_b) {
        let body_a = world_a.body(a);
        let body_b = world_b.body(b);
        assert_eq!(body_a.position().x.to_bits(), body_b.position().x.to_bits());
        assert_eq!(body_a.position().y.to_bits(), body_b.position().y.to_bits());
        assert_eq!(body_a.angle().to_bits(), body_b.angle().to_bits());
        assert_eq!(
            body_a.linear_velocity().x.to_bits(),
            body_b.linear_velocity().x.to_bits()
        );
        assert_eq!(
            body_a.linear_velocity().y.to_bits(),
            body_b.linear_velocity().y.to_bits()
        );
        assert_eq!(
            body_a.angular_velocity().to_bits(),
            body_b.angular_velocity().to_bits()
        );
    }
}

#[test]
fn stopped_bullet_rests_with_minimal_penetration() {
    let mut world = World::new(Vec2::ZERO);

    let wall = world.create_body(BodyDef::static_at(Vec2::new(10.0, 0.0)));
    world
        .create_fixture(wall, FixtureDef::new(PolygonShape::rect(0.05, 2.0)))
        .unwrap();

    let bullet = world.create_body(
        BodyDef::dynamic_at(Vec2::ZERO)
            .with_linear_velocity(Vec2::new(200.0, 0.0))
            .bullet(),
    );
    world
        .create_fixture(
            bullet,
            FixtureDef::new(CircleShape::new(0.1).unwrap()).with_density(1.0),
        )
        .unwrap();

    step_n(&mut world, 120);

    // The wall's near face is at x = 9.95. The sub-step position pass
    // leaves the bullet touching within a couple of slops, never buried.
    let x = world.body(bullet).position().x;
    assert!(x < 10.0, "bullet tunneled through the wall, x = {x}");
    let penetration = x + 0.1 - 9.95;
    assert!(
        penetration < 2.0 * LINEAR_SLOP,
        "bullet came to rest buried in the wall, penetration = {penetration}"
    );
}

#[test]
fn destroying_a_body_removes_its_contacts_and_joints() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    create_ground(&mut world);

    let anchor = world.create_body(BodyDef::static_at(Vec2::new(0.0, 4.0)));
    let body = world.create_body(BodyDef::dynamic_at(Vec2::new(0.0, 1.0)));
    world
        .create_fixture(
            body,
            FixtureDef::new(PolygonShape::rect(1.0, 1.0)).with_density(1.0),
        )
        .unwrap();
    let def = DistanceJointDef::new(anchor, body);
    world.create_joint(JointDef::Distance(def)).unwrap();

    step_n(&mut world, 30);
    assert!(world.contact_count() > 0);
    assert_eq!(world.joint_count(), 1);

    world.destroy_body(body);
    assert_eq!(world.contact_count(), 0);
    assert_eq!(world.joint_count(), 0);

    // The world keeps stepping fine without the body.
    step_n(&mut world, 10);
}
