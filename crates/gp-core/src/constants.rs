/// Side length of the toroidal grid (cells per axis).
pub const GRID_SIZE: u32 = 64;

/// Largest per-axis displacement a single step may produce.
pub const MAX_STEP: u32 = 3;

/// Number of trailing tokens fed to the context hasher (previous + current).
pub const CONTEXT_WINDOW: usize = 2;

/// Multiplier applied to the current token in the displacement mix.
pub const MIX_CURRENT: u32 = 31;

/// Multiplier applied to the previous token in the displacement mix.
pub const MIX_PREVIOUS: u32 = 17;

/// Right shift selecting the bit range that drives `dy`.
/// `dx` reads the low bits, so the two axes come from different ranges.
pub const DY_SHIFT: u32 = 8;

/// Start of the single default column: (15, 14), seed 0.
pub const DEFAULT_START: (u32, u32) = (15, 14);
