//! `define_service!`: declare a group of functions a low-level module calls
//! into a not-yet-linked subsystem (the real timer/console driver) without
//! creating a dependency edge on it.
//!
//! Each method becomes a field in a generated `$Services` struct of plain
//! function pointers, backed by a [`ServiceCell`](crate::service_cell::ServiceCell)
//! that starts out pointing at a stub (returns `T::default()`, does nothing
//! for `()`). The owning subsystem calls `register_<method>(real_fn)` during
//! its own init. Methods marked `@no_wrapper` get a struct field and a
//! registration function like everything else, but no auto-generated free
//! function — the caller writes its own (typically because the signature
//! needs adjusting, e.g. a `&[u8]` slice argument).

#[macro_export]
macro_rules! define_service {
    ($mod_name:ident => $services_name:ident { $($body:tt)* }) => {
        $crate::define_service!(@collect $mod_name $services_name [] $($body)*);
    };

    (@collect $mod_name:ident $services_name:ident [$($acc:tt)*]
        @no_wrapper $name:ident ($($arg:ident : $argty:ty),* $(,)?) -> $ret:ty; $($rest:tt)*) => {
        $crate::define_service!(@collect $mod_name $services_name
            [$($acc)* { no_wrapper $name ($($arg : $argty),*) -> $ret }] $($rest)*);
    };
    (@collect $mod_name:ident $services_name:ident [$($acc:tt)*]
        @no_wrapper $name:ident ($($arg:ident : $argty:ty),* $(,)?); $($rest:tt)*) => {
        $crate::define_service!(@collect $mod_name $services_name
            [$($acc)* { no_wrapper $name ($($arg : $argty),*) -> () }] $($rest)*);
    };
    (@collect $mod_name:ident $services_name:ident [$($acc:tt)*]
        $name:ident ($($arg:ident : $argty:ty),* $(,)?) -> $ret:ty; $($rest:tt)*) => {
        $crate::define_service!(@collect $mod_name $services_name
            [$($acc)* { wrapper $name ($($arg : $argty),*) -> $ret }] $($rest)*);
    };
    (@collect $mod_name:ident $services_name:ident [$($acc:tt)*]
        $name:ident ($($arg:ident : $argty:ty),* $(,)?); $($rest:tt)*) => {
        $crate::define_service!(@collect $mod_name $services_name
            [$($acc)* { wrapper $name ($($arg : $argty),*) -> () }] $($rest)*);
    };

    (@collect $mod_name:ident $services_name:ident [$({ $kind:ident $name:ident ($($arg:ident : $argty:ty),*) -> $ret:ty })*]) => {
        $crate::paste::paste! {
            #[derive(Clone, Copy)]
            pub struct $services_name {
                $( pub $name: fn($($argty),*) -> $ret, )*
            }

            $(
                #[allow(unused_variables)]
                fn [<__stub_ $mod_name _ $name>]($($arg: $argty),*) -> $ret {
                    Default::default()
                }
            )*

            static [<$mod_name:upper _SERVICES>]: $crate::service_cell::ServiceCell<$services_name> =
                $crate::service_cell::ServiceCell::new($services_name {
                    $( $name: [<__stub_ $mod_name _ $name>], )*
                });

            #[inline]
            pub fn [<$mod_name _services>]() -> $services_name {
                *[<$mod_name:upper _SERVICES>].get()
            }

            $(
                #[inline]
                pub fn [<register_ $name>](f: fn($($argty),*) -> $ret) {
                    [<$mod_name:upper _SERVICES>].write().$name = f;
                }
            )*

            $crate::define_service!(@wrappers $mod_name [$({ $kind $name ($($arg : $argty),*) -> $ret })*]);
        }
    };

    (@wrappers $mod_name:ident []) => {};
    (@wrappers $mod_name:ident [{ wrapper $name:ident ($($arg:ident : $argty:ty),*) -> $ret:ty } $($rest:tt)*]) => {
        $crate::paste::paste! {
            #[inline(always)]
            pub fn $name($($arg: $argty),*) -> $ret {
                ([<$mod_name _services>]().$name)($($arg),*)
            }
        }
        $crate::define_service!(@wrappers $mod_name [$($rest)*]);
    };
    (@wrappers $mod_name:ident [{ no_wrapper $name:ident ($($arg:ident : $argty:ty),*) -> $ret:ty } $($rest:tt)*]) => {
        $crate::define_service!(@wrappers $mod_name [$($rest)*]);
    };
}
