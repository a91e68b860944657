use bevy::color::palettes::css::RED;
pub use bevy::prelude::*;

use crate::{
    config::{Difficulty, RESET_PAUSE, SCREEN_HEIGHT, SCREEN_WIDTH, TITLE},
    rules::{Heading, Session},
};

const SHELL: f32 = 10.0;

#[derive(Clone, Debug, Resource)]
pub struct Materials {
    block: Handle<ColorMaterial>,
    food: Handle<ColorMaterial>,
    turtle: Handle<ColorMaterial>,
    square: Handle<Mesh>,
    circle: Handle<Mesh>,
    arrow: Handle<Mesh>,
}

impl FromWorld for Materials {
    fn from_world(world: &mut World) -> Self {
        let mut mats = world.resource_mut::<Assets<ColorMaterial>>();
        let block = mats.add(Color::BLACK);
        let food = mats.add(Color::from(RED));
        let turtle = mats.add(Color::BLACK);
        let mut meshes = world.resource_mut::<Assets<Mesh>>();
        let square = meshes.add(Rectangle::from_length(SHELL * 2.0));
        let circle = meshes.add(Circle::new(SHELL));
        let arrow = meshes.add(Triangle2d::new(
            Vec2::new(SHELL, 0.0),
            Vec2::new(-SHELL, SHELL * 0.8),
            Vec2::new(-SHELL, -SHELL * 0.8),
        ));
        Self {
            block,
            food,
            turtle,
            square,
            circle,
            arrow,
        }
    }
}

#[derive(Clone, Copy, Debug, Component)]
#[require(Transform, Visibility)]
pub struct Block;

#[derive(Clone, Copy, Debug, Component)]
#[require(Transform, Visibility)]
pub struct Food;

#[derive(Clone, Copy, Debug, Component)]
#[require(Transform, Visibility)]
pub struct Leader;

#[derive(Clone, Copy, Debug, Component)]
#[require(Transform, Visibility)]
pub struct Follower;

#[derive(Debug, Component)]
#[relationship(relationship_target = FollowedBy)]
pub struct Following(Entity);

// Despawning a segment takes the rest of the chain with it.
#[derive(Debug, Component)]
#[relationship_target(relationship = Following, linked_spawn)]
pub struct FollowedBy(Entity);

#[derive(Debug, Resource, Deref, DerefMut)]
pub struct TickTimer(Timer);

/// Running while a crash is on screen; ticks are held until it ends.
#[derive(Debug, Resource, Deref, DerefMut, Default)]
pub struct Freeze(Option<Timer>);

fn place(pos: IVec2, heading: Heading, z: f32) -> Transform {
    Transform::from_xyz(pos.x as f32, pos.y as f32, z)
        .with_rotation(Quat::from_rotation_z(heading.angle().to_radians()))
}

fn setup(mut command: Commands, materials: Res<Materials>, session: Res<Session>) {
    command.spawn(Camera2d);

    for &block in session.obstacles() {
        command.spawn((
            #[cfg(feature = "debug")]
            Name::new("Block"),
            Block,
            place(block, Heading::Stopped, 0.0),
            Mesh2d(materials.square.clone()),
            MeshMaterial2d(materials.block.clone()),
        ));
    }

    command.spawn((
        #[cfg(feature = "debug")]
        Name::new("Food"),
        Food,
        place(session.food(), Heading::Stopped, 0.0),
        Mesh2d(materials.circle.clone()),
        MeshMaterial2d(materials.food.clone()),
    ));

    let leader = session.leader();
    command.spawn((
        #[cfg(feature = "debug")]
        Name::new("Leader"),
        Leader,
        place(leader.pos, leader.heading, 2.0),
        Mesh2d(materials.arrow.clone()),
        MeshMaterial2d(materials.turtle.clone()),
    ));

    info!(
        "session started: {:?}, {} blocks, {}ms per tick",
        session.difficulty(),
        session.obstacles().len(),
        session.delay_ms()
    );
}

fn keyboard_input(keyboard_input: Res<ButtonInput<KeyCode>>, mut session: ResMut<Session>) {
    let heading = if keyboard_input.just_pressed(KeyCode::KeyW) {
        Heading::Up
    } else if keyboard_input.just_pressed(KeyCode::KeyA) {
        Heading::Left
    } else if keyboard_input.just_pressed(KeyCode::KeyS) {
        Heading::Down
    } else if keyboard_input.just_pressed(KeyCode::KeyD) {
        Heading::Right
    } else {
        return;
    };
    session.request(heading);
}

fn advance(
    time: Res<Time>,
    mut session: ResMut<Session>,
    mut tick_timer: ResMut<TickTimer>,
    mut freeze: ResMut<Freeze>,
) {
    if let Some(pause) = freeze.0.as_mut() {
        if !pause.tick(time.delta()).finished() {
            return;
        }
        freeze.take();
        session.reset();
        tick_timer.set_duration(session.delay());
        tick_timer.reset();
        info!("reset, back to {}ms per tick", session.delay_ms());
        return;
    }

    if !tick_timer.tick(time.delta()).just_finished() {
        return;
    }
    let report = session.tick(&mut rand::rng());
    tick_timer.set_duration(session.delay());

    if report.ate_food {
        info!(
            "ate food, chain of {}, {}ms per tick",
            session.followers().len(),
            session.delay_ms()
        );
    }
    if let Some(crash) = report.crash {
        info!("crashed: {crash:?}");
        freeze.replace(Timer::new(RESET_PAUSE, TimerMode::Once));
    }
}

#[allow(clippy::type_complexity)]
fn sync_visuals(
    mut command: Commands,
    session: Res<Session>,
    materials: Res<Materials>,
    query_leader: Single<(Entity, &mut Transform, Option<&FollowedBy>), With<Leader>>,
    mut query_food: Single<&mut Transform, (With<Food>, Without<Leader>, Without<Follower>)>,
    mut query_body: Query<(&mut Transform, Option<&FollowedBy>), (With<Follower>, Without<Leader>)>,
) {
    if !session.is_changed() {
        return;
    }
    **query_food = place(session.food(), Heading::Stopped, 0.0);

    let (leader_entity, mut transform, next) = query_leader.into_inner();
    let leader = session.leader();
    *transform = place(leader.pos, leader.heading, 2.0);

    let segments = session.followers();
    let mut last = leader_entity;
    let mut cursor = next.map(|f| f.0);
    let mut shown = 0;
    for segment in segments {
        let Some(entity) = cursor else {
            break;
        };
        let Ok((mut transform, following)) = query_body.get_mut(entity) else {
            break;
        };
        if let Some(pos) = segment.pos {
            *transform = place(pos, segment.heading, 1.0);
        }
        last = entity;
        cursor = following.map(|f| f.0);
        shown += 1;
    }

    if let Some(extra) = cursor.filter(|_| shown == segments.len()) {
        command.entity(extra).despawn();
    }
    for segment in &segments[shown..] {
        let pos = segment.pos.unwrap_or(leader.pos);
        last = command
            .spawn((
                #[cfg(feature = "debug")]
                Name::new("Follower"),
                Follower,
                Following(last),
                place(pos, segment.heading, 1.0),
                Mesh2d(materials.arrow.clone()),
                MeshMaterial2d(materials.turtle.clone()),
            ))
            .id();
    }
}

pub fn window() -> Window {
    Window {
        resolution: (SCREEN_WIDTH, SCREEN_HEIGHT).into(),
        title: TITLE.into(),
        resizable: false,
        ..Default::default()
    }
}

#[derive(Clone, Debug)]
pub struct TurtleGame {
    difficulty: Difficulty,
    obstacles: Vec<IVec2>,
}

impl TurtleGame {
    pub fn new(difficulty: Difficulty, obstacles: Vec<IVec2>) -> Self {
        Self {
            difficulty,
            obstacles,
        }
    }
}

impl Plugin for TurtleGame {
    fn build(&self, app: &mut App) {
        let session = Session::new(self.difficulty, self.obstacles.clone());
        let tick_timer = TickTimer(Timer::new(session.delay(), TimerMode::Repeating));
        app.insert_resource(ClearColor(Color::WHITE))
            .insert_resource(session)
            .insert_resource(tick_timer)
            .init_resource::<Materials>()
            .init_resource::<Freeze>()
            .add_systems(Startup, setup)
            .add_systems(Update, (keyboard_input, advance, sync_visuals).chain());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::time::TimeUpdateStrategy;
    use std::time::Duration;

    fn headless(obstacles: Vec<IVec2>) -> App {
        let session = Session::new(Difficulty::Easy, obstacles);
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(200)))
            .insert_resource(TickTimer(Timer::new(session.delay(), TimerMode::Repeating)))
            .insert_resource(session)
            .init_resource::<Freeze>()
            .add_systems(Update, advance);
        app
    }

    fn frozen(app: &App) -> bool {
        app.world().resource::<Freeze>().is_some()
    }

    #[test]
    fn test_crash_freezes_then_resets() {
        let mut app = headless(vec![IVec2::new(20, 0)]);
        app.world_mut().resource_mut::<Session>().request(Heading::Right);

        for _ in 0..10 {
            app.update();
            if frozen(&app) {
                break;
            }
        }
        assert!(frozen(&app));

        let mut frozen_updates = 0;
        while frozen(&app) && frozen_updates < 20 {
            let session = app.world().resource::<Session>();
            assert_eq!(session.leader().pos, IVec2::new(20, 0));
            app.update();
            frozen_updates += 1;
        }
        assert!(!frozen(&app));
        assert!(frozen_updates >= 4);

        let session = app.world().resource::<Session>();
        assert_eq!(session.leader().pos, IVec2::ZERO);
        assert_eq!(session.leader().heading, Heading::Stopped);
        assert_eq!(session.delay_ms(), 100);
    }

    #[test]
    fn test_requests_are_consumed_by_ticks() {
        let mut app = headless(Vec::new());
        app.world_mut().resource_mut::<Session>().request(Heading::Down);
        for _ in 0..5 {
            app.update();
        }
        let session = app.world().resource::<Session>();
        assert_eq!(session.leader().heading, Heading::Down);
        assert!(session.leader().pos.y < 0);
    }

    fn windowless(obstacles: Vec<IVec2>) -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, AssetPlugin::default()))
            .init_asset::<Mesh>()
            .init_asset::<ColorMaterial>()
            .init_resource::<ButtonInput<KeyCode>>()
            .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_millis(200)))
            .add_plugins(TurtleGame::new(Difficulty::Easy, obstacles));
        app
    }

    fn follower_count(app: &mut App) -> usize {
        let mut query = app.world_mut().query_filtered::<Entity, With<Follower>>();
        query.iter(app.world()).count()
    }

    fn update_until(app: &mut App, done: impl Fn(&mut App) -> bool) {
        for _ in 0..30 {
            app.update();
            if done(app) {
                return;
            }
        }
        panic!("condition not reached");
    }

    #[test]
    fn test_chain_entities_follow_session() {
        let mut app = windowless(vec![IVec2::new(0, 60)]);
        {
            let mut session = app.world_mut().resource_mut::<Session>();
            session.request(Heading::Up);
            session.set_food(IVec2::ZERO);
        }
        update_until(&mut app, |app| follower_count(app) > 0);
        assert_eq!(follower_count(&mut app), 1);

        let leader_pos = app.world().resource::<Session>().leader().pos;
        app.world_mut()
            .resource_mut::<Session>()
            .set_food(leader_pos);
        update_until(&mut app, |app| follower_count(app) > 1);
        assert_eq!(follower_count(&mut app), 2);

        app.world_mut()
            .resource_mut::<Session>()
            .set_food(IVec2::new(-200, -200));
        update_until(&mut app, |app| frozen(app));
        assert_eq!(follower_count(&mut app), 2);

        update_until(&mut app, |app| !frozen(app));
        assert_eq!(follower_count(&mut app), 0);
        assert!(app.world().resource::<Session>().followers().is_empty());

        let mut leaders = app.world_mut().query_filtered::<Entity, With<Leader>>();
        let leader = leaders.single(app.world()).unwrap();
        assert!(app.world().get::<FollowedBy>(leader).is_none());
    }

    #[test]
    fn test_key_press_fills_pending_slot() {
        let mut app = windowless(Vec::new());
        app.world_mut()
            .resource_mut::<TickTimer>()
            .set_duration(Duration::from_secs(60));
        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::KeyA);
        app.update();
        assert_eq!(
            app.world().resource::<Session>().pending(),
            Some(Heading::Left)
        );

        {
            let mut input = app.world_mut().resource_mut::<ButtonInput<KeyCode>>();
            input.release(KeyCode::KeyA);
            input.clear();
        }
        app.world_mut()
            .resource_mut::<TickTimer>()
            .set_duration(Duration::from_millis(100));
        app.update();
        let session = app.world().resource::<Session>();
        assert_eq!(session.pending(), None);
        assert_eq!(session.leader().heading, Heading::Left);
        assert_eq!(session.leader().pos, IVec2::new(-20, 0));
    }
}
