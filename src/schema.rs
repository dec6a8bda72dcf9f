/// Column-name constants for the raw line-list tables and the produced outputs.
/// Single source of truth - exported to Python via PyO3.

// ── Raw states table ────────────────────────────────────────────────────────
pub mod states {
    pub const ID: &str = "i";
    pub const ENERGY: &str = "E";
    pub const TOTAL_DEGENERACY: &str = "g_tot";
    pub const J: &str = "J";
    pub const LIFETIME: &str = "tau";
    pub const LANDE_G: &str = "g_J";

    /// Every states header starts with these, in this order.
    pub const LEADING: [&str; 4] = [ID, ENERGY, TOTAL_DEGENERACY, J];

    /// Columns that are never quantum labels.
    pub const RESERVED: [&str; 6] = [ID, ENERGY, TOTAL_DEGENERACY, J, LIFETIME, LANDE_G];

    /// Isomer label; must be resolved or pinned, never lumped over.
    pub const ISOMER: &str = "iso";
}

// ── Placeholder quantum values ──────────────────────────────────────────────
pub mod placeholder {
    pub const UNRESOLVED: &str = "*";
    pub const NOT_APPLICABLE: &str = "-1";

    pub const ALL: [&str; 2] = [UNRESOLVED, NOT_APPLICABLE];
}

// ── Lumped states table ─────────────────────────────────────────────────────
pub mod lumped_state {
    pub const ID: &str = "i";
    pub const ENERGY: &str = "E";
    pub const LIFETIME: &str = "tau";
    pub const LUMP_SIZE: &str = "lump_size";
    pub const ENERGY_J: &str = "J(E)";
    pub const TERM: &str = "term";
}

// ── Lumped transitions table ────────────────────────────────────────────────
pub mod lumped_transition {
    pub const INITIAL: &str = "i";
    pub const FINAL: &str = "f";
    pub const PARTIAL_LIFETIME: &str = "tau_if";
    pub const LUMP_SIZE: &str = "lump_size";
}

// ── Output file names ───────────────────────────────────────────────────────
pub mod files {
    pub const STATES_DATA: &str = "states_data.csv";
    pub const STATES_ELECTRONIC: &str = "states_electronic.csv";
    pub const STATES_VIBRATIONAL: &str = "states_vibrational.csv";
    pub const TRANSITIONS_DATA: &str = "transitions_data.csv";
    pub const COMPOSITE_MAP: &str = "states_composite_map.json";
    pub const ORIGINAL_TAU: &str = "states_original_tau.json";
    pub const METADATA: &str = "meta_data.json";
}

/// Wavenumbers (cm^-1) per electronvolt.
pub const EV_IN_CM: f64 = 8065.543937;
