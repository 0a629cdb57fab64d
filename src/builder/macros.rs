//! Macros for declaring controller state enums.

/// Declare a state enum and implement [`State`](crate::core::State) and
/// `Display` for it.
///
/// # Example
///
/// ```
/// use cashflow::state_enum;
/// use cashflow::core::State;
///
/// state_enum! {
///     pub enum HopperState {
///         Idle,
///         Paying,
///         Jammed,
///     }
///     error: [Jammed]
/// }
///
/// assert_eq!(HopperState::Paying.name(), "Paying");
/// assert!(HopperState::Jammed.is_error());
/// assert_eq!(HopperState::Idle.to_string(), "Idle");
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }

        $(error: [$($error:ident),* $(,)?])?
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn is_error(&self) -> bool {
                match self {
                    $($(Self::$error => true,)*)?
                    #[allow(unreachable_patterns)]
                    _ => false,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($crate::core::State::name(self))
            }
        }
    };
}
