/// Lenient numeric literal parser shared by both front ends.
///
/// Community chart files carry plenty of stray whitespace around their
/// numbers; non-finite values are rejected along with garbage.
pub(crate) fn parse_real(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}
