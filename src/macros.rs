//! Purpose: Registration macros for the common binding shapes.
//! Exports: `bind_struct!`, `bind_enum!`.
//! Role: Generates the `Bind`/`FieldType`/`ToVar` impls a plain struct or unit enum needs.
//! Invariants: Field order in the macro is serialization order.
//! Invariants: Anything the macros cannot express is written as a manual `Bind` impl.

/// Implements `Bind`, `FieldType`, and `ToVar` for a struct.
///
/// Each field names its wire name explicitly:
///
/// ```
/// use bindjson::bind_struct;
///
/// #[derive(Clone, Default)]
/// struct Person {
///     name: String,
///     age: i32,
/// }
///
/// bind_struct! {
///     Person {
///         name: String => "Name",
///         age: i32 => "Age",
///     }
/// }
/// ```
///
/// The plain form uses the field name as the wire name:
///
/// ```
/// use bindjson::bind_struct;
///
/// #[derive(Clone, Default)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// bind_struct! { Point { x: i32, y: i32 } }
/// ```
#[macro_export]
macro_rules! bind_struct {
    ($ty:ident { $($field:ident : $fty:ty => $wire:literal),+ $(,)? }) => {
        impl $crate::Bind for $ty {
            fn type_name() -> &'static str {
                stringify!($ty)
            }

            fn describe(schema: &mut $crate::Schema<Self>) {
                $(
                    schema
                        .field::<$fty, _, _>(
                            stringify!($field),
                            |target: &Self| &target.$field,
                            |target: &mut Self| &mut target.$field,
                        )
                        .with_wire_name($wire);
                )+
            }
        }

        $crate::bind_struct!(@common $ty);
    };
    ($ty:ident { $($field:ident : $fty:ty),+ $(,)? }) => {
        impl $crate::Bind for $ty {
            fn type_name() -> &'static str {
                stringify!($ty)
            }

            fn describe(schema: &mut $crate::Schema<Self>) {
                $(
                    schema.field::<$fty, _, _>(
                        stringify!($field),
                        |target: &Self| &target.$field,
                        |target: &mut Self| &mut target.$field,
                    );
                )+
            }
        }

        $crate::bind_struct!(@common $ty);
    };
    (@common $ty:ident) => {
        impl $crate::FieldType for $ty {
            const ACCEPTS_NULL: bool = true;

            fn export(&self) -> $crate::Var {
                $crate::Var::object(self.clone())
            }

            fn import(
                &mut self,
                value: &$crate::Value,
                options: &$crate::JsonOptions,
                sink: &mut $crate::ErrorSink,
            ) -> Result<(), $crate::Error> {
                $crate::import_object(self, value, options, sink)
            }
        }

        impl $crate::ToVar for $ty {
            fn to_var(&self) -> $crate::Var {
                $crate::Var::object(self.clone())
            }
        }
    };
}

/// Implements `FieldType` and `ToVar` for a unit enum, carrying both the
/// ordinal and the text so either wire form round-trips.
///
/// ```
/// use bindjson::bind_enum;
///
/// #[derive(Clone, Copy, Default, PartialEq, Debug)]
/// enum Color {
///     #[default]
///     Red,
///     Green,
/// }
///
/// bind_enum! { Color { Red = 0, Green = 1 } }
/// ```
#[macro_export]
macro_rules! bind_enum {
    ($ty:ident { $($variant:ident = $ordinal:literal),+ $(,)? }) => {
        impl $crate::FieldType for $ty {
            fn export(&self) -> $crate::Var {
                match self {
                    $(
                        $ty::$variant => $crate::Var::Enum($crate::EnumToken {
                            ordinal: $ordinal,
                            text: stringify!($variant),
                        }),
                    )+
                }
            }

            fn import(
                &mut self,
                value: &$crate::Value,
                _options: &$crate::JsonOptions,
                sink: &mut $crate::ErrorSink,
            ) -> Result<(), $crate::Error> {
                match value {
                    $crate::Value::Null => Ok(()),
                    $crate::Value::Str(text) => {
                        let trimmed = text.trim();
                        $(
                            if trimmed == stringify!($variant) {
                                *self = $ty::$variant;
                                return Ok(());
                            }
                        )+
                        if let Ok(ordinal) = trimmed.parse::<i64>() {
                            return self.import(
                                &$crate::Value::I64(ordinal),
                                _options,
                                sink,
                            );
                        }
                        sink.report(
                            $crate::Error::new($crate::ErrorKind::Conversion)
                                .with_message(format!(
                                    "'{trimmed}' is not a {} value",
                                    stringify!($ty)
                                )),
                        )
                    }
                    other => {
                        let ordinal = match other {
                            $crate::Value::I32(n) => Some(*n as i64),
                            $crate::Value::I64(n) => Some(*n),
                            _ => None,
                        };
                        match ordinal {
                            $(
                                Some($ordinal) => {
                                    *self = $ty::$variant;
                                    Ok(())
                                }
                            )+
                            _ => sink.report(
                                $crate::Error::new($crate::ErrorKind::Conversion)
                                    .with_message(format!(
                                        "cannot convert {} to {}",
                                        other.kind_name(),
                                        stringify!($ty)
                                    )),
                            ),
                        }
                    }
                }
            }
        }

        impl $crate::ToVar for $ty {
            fn to_var(&self) -> $crate::Var {
                $crate::FieldType::export(self)
            }
        }
    };
}
