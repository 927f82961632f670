/// Arena slot.
pub enum Entry<T> {
    /// Free; holds the index of the next free slot.
    Vacant(usize),
    Occupied(T),
}
