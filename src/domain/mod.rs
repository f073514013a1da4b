// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types describing what the attention model talks
// about: where it looks (locations), how that maps onto pixels
// (glimpse geometry), and what it answers (predictions).
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// Normalised locations and the location → pixel mapping
pub mod location;

// Predicted label plus glimpse trajectory
pub mod prediction;

// Core abstractions (traits) that other layers implement
pub mod traits;
