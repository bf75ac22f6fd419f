/// Define an error type wrapper e.g. `Foo` around a
/// `Box<FooKind>`. Implements the `std::error::Error`,
/// `std::ops::Deref` and `From` traits on `Foo` to make the
/// underlying `FooKind` transparently accessible. Thanks to the
/// `From` forwarding, `thiserror`'s `#[from]` syntax still
/// works. Also implements `Debug`. `FooKind` has to be defined
/// separately.
#[macro_export]
macro_rules! def_boxed_error {
    ($wrappername:ident, $kindname:ident) => {

        #[derive(Debug)]
        pub struct $wrappername(Box<$kindname>);

        impl $wrappername {
            pub fn kind(&self) -> &$kindname {
                &*self.0
            }
        }

        impl std::ops::Deref for $wrappername {
            type Target = $kindname;

            fn deref(&self) -> &Self::Target {
                &*self.0
            }
        }

        impl<E> From<E> for $wrappername where $kindname: From<E> {
            fn from(err: E) -> Self {
                $wrappername(Box::new($kindname::from(err)))
            }
        }

        impl std::error::Error for $wrappername {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                self.0.source()
            }
        }

        impl std::fmt::Display for $wrappername {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                // Don't use the fmt method call as it can be
                // ambiguous
                std::fmt::Display::fmt(&*self.0, f)
            }
        }
    }
}

/// Defines both an error enum and its box wrapper as per
/// `def_boxed_error`. Derives `thiserror::Error` on the inner type,
/// hence the using crate needs `thiserror` as a dependency.
#[macro_export]
macro_rules! def_boxed_thiserror {
    ($wrappername:ident, $(#[$meta:meta])* $vis:vis enum $kindname:ident {$($body:tt)*}) => {
        #[derive(thiserror::Error, Debug)]
        $(#[$meta])*
        $vis enum $kindname {
            $($body)*
        }

        $crate::def_boxed_error!($wrappername, $kindname);
    }
}
