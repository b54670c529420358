/// The two-value color tag of a red-black tree node.
///
/// NIL children are conventionally BLACK for the purposes of the
/// black-height invariant; see [`Color::of_nil`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Black,
}

impl Color {
    /// The color NIL is conventionally treated as having, for black-height
    /// purposes.
    pub const fn of_nil() -> Self {
        Color::Black
    }
}
