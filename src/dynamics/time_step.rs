use glam::Vec2;

/// Per-step solver parameters.
#[derive(Debug, Clone, Copy)]
pub struct TimeStep {
    pub dt: f32,
    pub inv_dt: f32,
    /// dt * inv_dt of the previous step, used to scale warm-start impulses
    /// when the step size changes.
    pub dt_ratio: f32,
    pub velocity_iterations: usize,
    pub position_iterations: usize,
    pub warm_starting: bool,
}

/// Island-local body position state. The solver works on these arrays and
/// writes back to the bodies once the island converges.
#[derive(Debug, Clone, Copy, Default)]
pub struct Position {
    pub c: Vec2,
    pub a: f32,
}

/// Island-local body velocity state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Velocity {
    pub v: Vec2,
    pub w: f32,
}

/// What the joint solvers see: the step plus the island state arrays,
/// indexed by each body's island index.
pub struct SolverData<'a> {
    pub step: TimeStep,
    pub positions: &'a mut [Position],
    pub velocities: &'a mut [Velocity],
}

/// Wall-clock timings of the last step, in milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Profile {
    pub step: f32,
    pub collide: f32,
    pub solve: f32,
    pub solve_init: f32,
    pub solve_velocity: f32,
    pub solve_position: f32,
    pub broad_phase: f32,
    pub solve_toi: f32,
}
