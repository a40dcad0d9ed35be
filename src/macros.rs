pub use enclose::*;

/// Builds a plain (not yet reactive) [`Store`](crate::Store).
///
/// ```
/// let data = tether::store! {
///     "msg" => "hi",
///     "user" => tether::store! { "name" => "ann" },
/// };
/// assert_eq!(data.len(), 2);
/// ```
#[macro_export]
macro_rules! store {
    () => {
        $crate::Store::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        <$crate::Store as ::std::iter::FromIterator<(&str, $crate::Value)>>::from_iter([
            $( ($key, $crate::Value::from($value)) ),+
        ])
    };
}

/// Creates a [`Watcher`](crate::Watcher) over `scope`.
///
/// The optional parenthesized list is cloned into the getter with
/// [`enclose!`](enclose::enclose).
#[macro_export]
macro_rules! watch {
    ($scope:expr, ( $($d_tt:tt)* ) $ctx:ident => $body:expr, $callback:expr) => {
        $crate::Watcher::new(
            $scope,
            $crate::macros::enclose!(($( $d_tt )*) move |$ctx: &$crate::Store| $body),
            $callback,
        )
    };
    ($scope:expr, $ctx:ident => $body:expr, $callback:expr) => {
        $crate::Watcher::new($scope, move |$ctx: &$crate::Store| $body, $callback)
    };
}
