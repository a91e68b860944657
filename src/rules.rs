use std::time::Duration;

use bevy::{
    log::{debug, warn},
    math::IVec2,
    prelude::Resource,
};
use rand::Rng;

use crate::config::{
    BOUND, CLEARANCE, DELAY_DECREMENT_MS, Difficulty, FOOD_ATTEMPTS, FOOD_START, ORIGIN, STEP,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Heading {
    Up,
    Left,
    Down,
    Right,
    #[default]
    Stopped,
}

impl Heading {
    pub fn opposite(self, rhs: Self) -> bool {
        matches!(
            (self, rhs),
            (Heading::Up, Heading::Down)
                | (Heading::Left, Heading::Right)
                | (Heading::Down, Heading::Up)
                | (Heading::Right, Heading::Left)
        )
    }

    pub fn delta(self) -> IVec2 {
        match self {
            Heading::Up => IVec2::new(0, STEP),
            Heading::Left => IVec2::new(-STEP, 0),
            Heading::Down => IVec2::new(0, -STEP),
            Heading::Right => IVec2::new(STEP, 0),
            Heading::Stopped => IVec2::ZERO,
        }
    }

    /// Counter-clockwise tilt in degrees, right being zero.
    pub fn angle(self) -> f32 {
        match self {
            Heading::Right | Heading::Stopped => 0.0,
            Heading::Up => 90.0,
            Heading::Left => 180.0,
            Heading::Down => 270.0,
        }
    }
}

pub fn touching(a: IVec2, b: IVec2) -> bool {
    a.distance_squared(b) < CLEARANCE * CLEARANCE
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Leader {
    pub pos: IVec2,
    pub heading: Heading,
}

impl Default for Leader {
    fn default() -> Self {
        Self {
            pos: ORIGIN,
            heading: Heading::Stopped,
        }
    }
}

impl Leader {
    pub fn steer(&mut self, heading: Heading) {
        if !self.heading.opposite(heading) {
            self.heading = heading;
        }
    }

    pub fn move_forward(&mut self) {
        self.pos += self.heading.delta();
    }

    pub fn is_off_screen(&self) -> bool {
        self.pos.x.abs() > BOUND || self.pos.y.abs() > BOUND
    }
}

/// A trailing segment. Freshly grown segments have no position until the
/// chain shifts for the first time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Follower {
    pub pos: Option<IVec2>,
    pub heading: Heading,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Crash {
    OffScreen,
    SelfCollision,
    Obstacle,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub ate_food: bool,
    /// Set when the tick ended in a crash. The session is left as it was at
    /// the crash; the caller decides when to [`Session::reset`].
    pub crash: Option<Crash>,
}

/// Complete game state for one run, independent of any window.
#[derive(Clone, Debug, Resource)]
pub struct Session {
    difficulty: Difficulty,
    leader: Leader,
    followers: Vec<Follower>,
    food: IVec2,
    obstacles: Vec<IVec2>,
    delay_ms: i64,
    pending: Option<Heading>,
}

impl Session {
    pub fn new(difficulty: Difficulty, obstacles: Vec<IVec2>) -> Self {
        Self {
            difficulty,
            leader: Leader::default(),
            followers: Vec::new(),
            food: FOOD_START,
            obstacles,
            delay_ms: difficulty.delay_ms(),
            pending: None,
        }
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn leader(&self) -> &Leader {
        &self.leader
    }

    pub fn followers(&self) -> &[Follower] {
        &self.followers
    }

    pub fn food(&self) -> IVec2 {
        self.food
    }

    pub fn obstacles(&self) -> &[IVec2] {
        &self.obstacles
    }

    /// Current delay, may be negative after a long run.
    pub fn delay_ms(&self) -> i64 {
        self.delay_ms
    }

    /// Pause between ticks. A negative delay means no pause at all.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.max(0) as u64)
    }

    /// Queues a heading change for the next tick. Each request is checked
    /// against the heading it would follow, so a quick up-then-left while
    /// moving right still ends up turning left.
    pub fn request(&mut self, heading: Heading) {
        let mut ahead = Leader {
            heading: self.pending.unwrap_or(self.leader.heading),
            ..self.leader
        };
        ahead.steer(heading);
        if ahead.heading == heading {
            self.pending = Some(heading);
        }
    }

    #[cfg(test)]
    pub fn pending(&self) -> Option<Heading> {
        self.pending
    }

    #[cfg(test)]
    pub fn set_food(&mut self, food: IVec2) {
        self.food = food;
    }

    pub fn tick<R: Rng>(&mut self, rng: &mut R) -> TickReport {
        let mut report = TickReport::default();
        if let Some(heading) = self.pending.take() {
            self.leader.heading = heading;
        }

        if self.leader.is_off_screen() {
            report.crash = Some(Crash::OffScreen);
            return report;
        }

        if touching(self.leader.pos, self.food) {
            if let Some(food) = self.place_food(rng) {
                self.food = food;
            }
            self.followers.push(Follower::default());
            self.delay_ms -= DELAY_DECREMENT_MS;
            report.ate_food = true;
        }

        self.shift_followers();
        self.leader.move_forward();

        let head = self.leader.pos;
        if self
            .followers
            .iter()
            .filter_map(|f| f.pos)
            .any(|pos| touching(head, pos))
        {
            report.crash = Some(Crash::SelfCollision);
        } else if self.obstacles.iter().any(|&block| touching(head, block)) {
            report.crash = Some(Crash::Obstacle);
        }
        report
    }

    /// Back to the origin with an empty chain and the starting delay. The food
    /// stays where it is.
    pub fn reset(&mut self) {
        self.leader = Leader::default();
        self.followers.clear();
        self.delay_ms = self.difficulty.delay_ms();
    }

    fn shift_followers(&mut self) {
        for idx in (1..self.followers.len()).rev() {
            self.followers[idx] = self.followers[idx - 1];
        }
        if let Some(first) = self.followers.first_mut() {
            first.pos = Some(self.leader.pos);
            first.heading = self.leader.heading;
        }
    }

    fn is_clear(&self, spot: IVec2) -> bool {
        !self.obstacles.iter().any(|&block| touching(spot, block))
    }

    fn place_food<R: Rng>(&self, rng: &mut R) -> Option<IVec2> {
        for _ in 0..FOOD_ATTEMPTS {
            let spot = IVec2::new(
                rng.random_range(-BOUND..=BOUND),
                rng.random_range(-BOUND..=BOUND),
            );
            if self.is_clear(spot) {
                return Some(spot);
            }
        }
        debug!("random food placement gave up, scanning the board");
        let spots = clear_spots(&self.obstacles);
        if spots.is_empty() {
            warn!("no room left for food, leaving it in place");
            return None;
        }
        Some(spots[rng.random_range(0..spots.len())])
    }
}

/// Every integer point on screen at least one clearance away from all blocks.
fn clear_spots(obstacles: &[IVec2]) -> Vec<IVec2> {
    let side = (2 * BOUND + 1) as usize;
    let index = |p: IVec2| (p.y + BOUND) as usize * side + (p.x + BOUND) as usize;
    let mut blocked = vec![false; side * side];
    let reach = CLEARANCE - 1;

    for &block in obstacles {
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let spot = block + IVec2::new(dx, dy);
                if spot.x.abs() > BOUND || spot.y.abs() > BOUND || !touching(spot, block) {
                    continue;
                }
                blocked[index(spot)] = true;
            }
        }
    }

    blocked
        .iter()
        .enumerate()
        .filter(|&(_, &b)| !b)
        .map(|(i, _)| IVec2::new((i % side) as i32 - BOUND, (i / side) as i32 - BOUND))
        .collect()
}
