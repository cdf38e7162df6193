//! Hex formatting for trace output.

/// Format bytes as a compact hex string (e.g., "4a2f00ff").
pub fn format_bytes(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}
