//! The `injectable!` macro
//!
//! Generates the [`Injectable`](crate::Injectable) schema impl and one
//! [`Implements`](crate::Implements) impl per declared key for a concrete
//! type. The schema is the explicit stand-in for marker discovery: clauses
//! in the macro play the role of the inject marker on constructors and
//! properties.

/// Declare a concrete type as injectable.
///
/// Clauses, all optional, in this order:
///
/// - `keys: [K1, K2, ...];` - key types the concrete type satisfies
///   (besides its own type, which is always included). Trait-object keys
///   must be `Send + Sync` traits.
/// - `constructor(name: KeyType, ...) => expr;` - a constructor marked for
///   injection. Each parameter is bound as `Arc<KeyType>` in the body
///   expression. Declaring more than one reproduces the ambiguous-marker
///   failure at resolution time.
/// - `property name: KeyType => |this, value| expr;` - a writable property
///   marked for injection; `this` is `&mut` the concrete type and `value`
///   is `Arc<KeyType>`. Properties are injected in declaration order.
/// - `fallback => expr;` - the zero-argument constructor, used when no
///   constructor is marked.
///
/// # Examples
///
/// ```rust
/// use keywire::prelude::*;
/// use keywire::injectable;
///
/// trait Sink: Send + Sync {
///     fn accept(&self, line: &str);
/// }
///
/// struct NullSink;
///
/// impl Sink for NullSink {
///     fn accept(&self, _line: &str) {}
/// }
///
/// injectable!(NullSink {
///     keys: [dyn Sink];
///     fallback => NullSink;
/// });
///
/// struct Label(String);
///
/// injectable!(Label {});
///
/// struct Relay {
///     sink: Arc<dyn Sink>,
///     label: Option<Arc<Label>>,
/// }
///
/// injectable!(Relay {
///     constructor(sink: dyn Sink) => Relay { sink, label: None };
///     property label: Label => |relay, label| relay.label = Some(label);
/// });
///
/// let container = Container::new();
/// container.register_implementation::<dyn Sink, NullSink>(Lifetime::PerContainer)?;
/// container.register_instance::<Label, Label>(Arc::new(Label("relay-a".into())))?;
///
/// let relay = container.create_instance::<Relay>()?;
/// relay.sink.accept("ready");
/// assert_eq!(relay.label.as_ref().unwrap().0, "relay-a");
/// # Ok::<(), keywire::DiError>(())
/// ```
#[macro_export]
macro_rules! injectable {
    (
        $ty:ty {
            $( keys: [ $( $key:ty ),* $(,)? ]; )?
            $( constructor ( $( $pname:ident : $pty:ty ),* $(,)? ) => $body:expr ; )*
            $( property $prop:ident : $propty:ty => | $this:ident , $value:ident | $set:expr ; )*
            $( fallback => $fallback:expr ; )?
        }
    ) => {
        impl $crate::Injectable for $ty {
            fn schema() -> &'static $crate::Schema {
                static SCHEMA: $crate::__private::Lazy<$crate::Schema> =
                    $crate::__private::Lazy::new(|| $crate::Schema {
                        name: ::std::any::type_name::<$ty>(),
                        key: $crate::Key::of::<$ty>(),
                        keys: ::std::vec![
                            ($crate::Key::of::<$ty>(), {
                                fn __cast(
                                    value: ::std::sync::Arc<dyn ::std::any::Any + Send + Sync>,
                                ) -> ::std::option::Option<$crate::Object> {
                                    let concrete = value.downcast::<$ty>().ok()?;
                                    ::std::option::Option::Some(
                                        $crate::Object::from_handle::<$ty>(concrete),
                                    )
                                }
                                __cast as $crate::Caster
                            }),
                            $($(
                                ($crate::Key::of::<$key>(), {
                                    fn __cast(
                                        value: ::std::sync::Arc<dyn ::std::any::Any + Send + Sync>,
                                    ) -> ::std::option::Option<$crate::Object> {
                                        let concrete = value.downcast::<$ty>().ok()?;
                                        ::std::option::Option::Some(
                                            $crate::Object::from_handle::<$key>(
                                                <$ty as $crate::Implements<$key>>::upcast(concrete),
                                            ),
                                        )
                                    }
                                    __cast as $crate::Caster
                                }),
                            )*)?
                        ],
                        constructors: ::std::vec![
                            $(
                                $crate::ConstructorSpec {
                                    params: ::std::vec![ $( $crate::Key::of::<$pty>() ),* ],
                                    build: {
                                        fn __build(
                                            args: &[$crate::Object],
                                        ) -> ::std::boxed::Box<dyn ::std::any::Any + Send + Sync>
                                        {
                                            #[allow(unused_mut, unused_variables)]
                                            let mut args = args.iter();
                                            $(
                                                let $pname: ::std::sync::Arc<$pty> = args
                                                    .next()
                                                    .expect("argument per constructor parameter")
                                                    .handle::<$pty>();
                                            )*
                                            let value: $ty = $body;
                                            ::std::boxed::Box::new(value)
                                        }
                                        __build
                                    },
                                },
                            )*
                        ],
                        properties: ::std::vec![
                            $(
                                $crate::PropertySpec {
                                    name: ::std::stringify!($prop),
                                    key: $crate::Key::of::<$propty>(),
                                    set: {
                                        fn __set(
                                            target: &mut dyn ::std::any::Any,
                                            value: $crate::Object,
                                        ) {
                                            let $this: &mut $ty = target
                                                .downcast_mut::<$ty>()
                                                .expect("property target matches schema type");
                                            let $value: ::std::sync::Arc<$propty> =
                                                value.handle::<$propty>();
                                            $set;
                                        }
                                        __set
                                    },
                                },
                            )*
                        ],
                        fallback: $crate::injectable!(@fallback $ty $(, $fallback)?),
                    });
                &SCHEMA
            }
        }

        $($(
            impl $crate::Implements<$key> for $ty {
                #[inline]
                fn upcast(this: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$key> {
                    this
                }
            }
        )*)?
    };

    (@fallback $ty:ty) => {
        ::std::option::Option::None
    };

    (@fallback $ty:ty, $fallback:expr) => {
        ::std::option::Option::Some({
            fn __fallback() -> ::std::boxed::Box<dyn ::std::any::Any + Send + Sync> {
                let value: $ty = $fallback;
                ::std::boxed::Box::new(value)
            }
            __fallback as fn() -> ::std::boxed::Box<dyn ::std::any::Any + Send + Sync>
        })
    };
}
