use std::fmt;

/// Cursor into a data source's baseline order.
///
/// Indices are created by [`ImageSet::start_index`](super::ImageSet::start_index)
/// and are only meaningful to the source that produced them.
pub trait BaselineIndex: Send + Sync + fmt::Debug {
    fn next(&mut self);
    fn previous(&mut self);
    /// Jumps to the next band (or equivalent coarse unit).
    fn large_step_next(&mut self);
    fn large_step_previous(&mut self);
    fn is_valid(&self) -> bool;
    fn describe(&self) -> String;
    fn box_clone(&self) -> Box<dyn BaselineIndex>;
    /// Antennas of the baseline the cursor points at.
    fn antenna_pair(&self) -> (usize, usize);
    fn band(&self) -> usize;

    fn is_auto_correlation(&self) -> bool {
        let (a1, a2) = self.antenna_pair();
        a1 == a2
    }
}

impl Clone for Box<dyn BaselineIndex> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}
