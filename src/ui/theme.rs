use ratatui::style::Color;

// A small palette (dark surface + orange accent) with limited semantic colors.
//
// Keep this cohesive. Prefer adding new roles here instead of sprinkling
// colors through the UI.
pub const FG: Color = Color::Rgb(229, 231, 235);
pub const MUTED: Color = Color::Rgb(156, 163, 175);
pub const DIM: Color = Color::Rgb(107, 114, 128);
pub const BORDER: Color = Color::Rgb(55, 65, 81);
pub const BAR_BG: Color = Color::Rgb(14, 18, 24);

pub const ACCENT: Color = Color::Rgb(255, 159, 26);

// Semantic colors: job status plus snapshot presence.
pub const SUCCESS: Color = Color::Rgb(134, 239, 172); // terminal, good
pub const ERROR: Color = Color::Rgb(248, 113, 113); // terminal, bad
pub const ACTIVE: Color = Color::Rgb(125, 211, 252); // actively working
pub const WARN: Color = Color::Rgb(250, 204, 21); // pruned snapshots
