mod watermark;
#[cfg(test)]
mod tests;

pub use watermark::Watermark;

/// Logical timestamp carried by every transaction event.
pub type Step = u64;
