//! Constants used in GlobalPlatform operations
//!
//! Class bytes, instruction codes, parameter values, tags and well-known
//! identifiers from GlobalPlatform Card Specification 2.1.1.

/// GlobalPlatform command classes
pub mod cla {
    /// ISO7816 command class
    pub const ISO7816: u8 = 0x00;
    /// GlobalPlatform command class
    pub const GP: u8 = 0x80;
    /// Secure messaging indicator, OR-ed into CLA of MAC-protected commands
    pub const SECURE_MESSAGING: u8 = 0x04;
    /// GlobalPlatform command class with secure messaging
    pub const MAC: u8 = GP | SECURE_MESSAGING;
}

/// GlobalPlatform instruction codes
pub mod ins {
    /// SELECT command
    pub const SELECT: u8 = 0xA4;
    /// INITIALIZE UPDATE command
    pub const INITIALIZE_UPDATE: u8 = 0x50;
    /// EXTERNAL AUTHENTICATE command
    pub const EXTERNAL_AUTHENTICATE: u8 = 0x82;
    /// DELETE command
    pub const DELETE: u8 = 0xE4;
    /// LOAD command
    pub const LOAD: u8 = 0xE8;
    /// INSTALL command
    pub const INSTALL: u8 = 0xE6;
}

/// Parameter values for SELECT command (P1)
pub mod select_p1 {
    /// Select by DF name
    pub const BY_NAME: u8 = 0x04;
}

/// Security level byte sent as P1 of EXTERNAL AUTHENTICATE
pub mod security_level {
    /// No secure messaging after authentication
    pub const NONE: u8 = 0x00;
    /// C-MAC on every subsequent command
    pub const CMAC: u8 = 0x01;
}

/// Parameter values for INSTALL command (P1)
pub mod install_p1 {
    /// Install for load
    pub const FOR_LOAD: u8 = 0x02;
    /// Install for install
    pub const FOR_INSTALL: u8 = 0x04;
    /// Install for make selectable
    pub const FOR_MAKE_SELECTABLE: u8 = 0x08;
    /// Install for install and make selectable
    pub const FOR_INSTALL_AND_MAKE_SELECTABLE: u8 = FOR_INSTALL | FOR_MAKE_SELECTABLE;
}

/// Parameter values for LOAD command (P1)
pub mod load_p1 {
    /// More blocks to follow
    pub const MORE_BLOCKS: u8 = 0x00;
    /// Last block
    pub const LAST_BLOCK: u8 = 0x80;
}

/// Parameter values for DELETE command (P2)
pub mod delete_p2 {
    /// Delete object
    pub const OBJECT: u8 = 0x00;
    /// Delete object and related objects
    pub const OBJECT_AND_RELATED: u8 = 0x80;
}

/// Tags used in GlobalPlatform commands
pub mod tags {
    /// AID tag for DELETE command
    pub const AID: u8 = 0x4F;
    /// Load file data block tag
    pub const LOAD_FILE_DATA_BLOCK: u8 = 0xC4;
    /// Application specific install parameters
    pub const INSTALL_PARAMETERS: u8 = 0xC9;
}

/// Secure Channel Protocol (SCP) versions
pub mod scp {
    /// SCP02 protocol version
    pub const SCP02: u8 = 0x02;
}

/// Session key derivation constants (GP 2.1.1 E.4.1)
pub mod derivation {
    /// C-MAC session key
    pub const CMAC: [u8; 2] = [0x01, 0x01];
    /// R-MAC session key
    pub const RMAC: [u8; 2] = [0x01, 0x02];
    /// Encryption session key
    pub const ENC: [u8; 2] = [0x01, 0x82];
    /// Data encryption session key
    pub const DEK: [u8; 2] = [0x01, 0x81];
}

/// Length of the INITIALIZE UPDATE response data
pub const INITIALIZE_UPDATE_RESPONSE_LENGTH: usize = 28;

/// Length of a C-MAC appended to a command
pub const MAC_LENGTH: usize = 8;

/// GlobalPlatform card manager AID
pub const CARD_MANAGER_AID: &[u8] = &[0xA0, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00];

/// Test key shipped on development cards (40 41 .. 4F)
pub const DEFAULT_KEY: [u8; 16] = [
    0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F,
];
