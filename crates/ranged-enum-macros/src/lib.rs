extern crate proc_macro;
use darling::ast::NestedMeta;
use darling::util::PathList;
use darling::{Error, FromMeta, FromVariant, Result};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use ranged_enum::format::BUILTIN_FIELDS;
use ranged_enum::{EnumBuilder, Value};
use std::collections::HashMap;
use syn::ext::IdentExt;
use syn::{parse_macro_input, Data, DeriveInput, Expr, Fields, Ident, Lit, UnOp, Variant};

/// Options of the `#[ranged_enum(...)]` attribute
///
/// Parameters:
/// - `name` (optional): the name of the definition, used in error messages. Defaults to the enum identifier
/// - `attributes(a, b, ...)` (optional): the attribute names every variant must provide values for
/// - `format` (optional): the default format template of all variants (default `"{value}"`)
#[derive(Debug, Default, FromMeta)]
#[darling(default)]
struct EnumArgs {
    name: Option<String>,
    attributes: PathList,
    format: Option<String>,
}

/// Represents the `#[range(...)]` attribute of a single variant
///
/// Parameters:
/// - `value`: the single value of the variant (same as a discriminant `Variant = value`)
/// - `start`, `end`: the first and last values covered by the variant (both included)
/// - `format` (optional): the format template of this variant, overriding the enum's one
/// - `attrs(a = ..., b = ...)`: values of the attributes declared on the enum
///
/// Bounds are read as expressions so negative literals (`start = -5`) are accepted
#[derive(Debug, Default, FromVariant)]
#[darling(default, attributes(range))]
struct Range {
    value: Option<Expr>,
    start: Option<Expr>,
    end: Option<Expr>,
    format: Option<String>,
    #[darling(rename = "attrs")]
    values: HashMap<String, Lit>,
}

/// A variant after validation
struct MemberDef {
    ident: Ident,
    name: String,
    low: i64,
    high: i64,
    format: Option<String>,
    attrs: Vec<Value>,
}

impl MemberDef {
    /// The descriptor handed to `EnumBuilder`, both at expansion and in the generated code
    fn descriptor(&self) -> Value {
        let range = if self.low == self.high {
            Value::Int(self.low)
        } else {
            Value::Seq(vec![Value::Int(self.low), Value::Int(self.high)])
        };
        if self.attrs.is_empty() {
            return range;
        }
        let mut fields = Vec::with_capacity(1 + self.attrs.len());
        fields.push(range);
        fields.extend(self.attrs.iter().cloned());
        Value::Seq(fields)
    }
}

/// Declares a ranged enum: each variant covers a subrange of integers and integers resolve back to variants
///
/// ```rust
/// use ranged_enum_macros::ranged_enum;
///
/// #[ranged_enum(attributes(brief), format = "{value} {brief!r}")]
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum Devices {
///     #[range(attrs(brief = "Primary device"))]
///     Primary = 1,
///     #[range(start = 3, end = 10, attrs(brief = "User defined device"))]
///     UserDefined,
/// }
///
/// assert_eq!(Devices::resolve(7).unwrap(), Devices::UserDefined);
/// assert_eq!(Devices::Primary.to_string(), "1 'Primary device'");
/// assert!(Devices::try_resolve(2).is_none());
/// ```
///
/// A variant's range comes from exactly one of: a discriminant (`Variant = 1`), `#[range(value = 1)]`,
/// or `#[range(start = 3, end = 10)]`. Ranges may not overlap or touch. Discriminants and `range`
/// attributes are removed from the emitted enum.
///
/// The whole definition (ranges, attributes, names and format templates) is validated during expansion,
/// so an invalid enum is a compile error.
///
/// Generated items:
/// - `definition()`: the `ranged_enum::EnumDefinition` backing the enum, built on first use
/// - `member()`, `name()`, `range()`, `contains(value)`: per-variant accessors
/// - `resolve(value)`, `try_resolve(value)` and `TryFrom<i64>`: integer to variant resolution
/// - `Display`, through the variant's format rule
///
/// `#[ranged_enum]` must be applied before any derives because it changes the definition of the enum.
#[proc_macro_attribute]
pub fn ranged_enum(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = match NestedMeta::parse_meta_list(args.into()) {
        Ok(list) => list,
        Err(err) => return Error::from(err).write_errors().into(),
    };
    let args = match EnumArgs::from_list(&args) {
        Ok(args) => args,
        Err(err) => return err.write_errors().into(),
    };

    let mut ast = parse_macro_input!(input as DeriveInput);

    let generated = match expand(&mut ast, &args) {
        Ok(generated) => generated,
        Err(err) => return err.write_errors().into(),
    };

    let result = quote! {
        #ast

        #generated
    };

    result.into()
}

/// Validates the enum, strips range information from it in place and generates the supporting impls
fn expand(ast: &mut DeriveInput, args: &EnumArgs) -> Result<TokenStream2> {
    let enum_ident = ast.ident.clone();

    if !ast.generics.params.is_empty() {
        return Err(Error::custom("ranged_enum does not support generic enums").with_span(&ast.generics));
    }

    let data_enum = match ast.data {
        Data::Enum(ref mut data_enum) => data_enum,
        _ => return Err(Error::custom("ranged_enum can only be applied to enum types").with_span(&enum_ident)),
    };

    if data_enum.variants.is_empty() {
        return Err(Error::custom("ranged_enum needs at least one variant").with_span(&enum_ident));
    }

    let attributes = attribute_names(&args.attributes)?;

    let mut errors = Error::accumulator();
    let mut members = Vec::new();
    for variant in data_enum.variants.iter_mut() {
        if let Some(member) = errors.handle(parse_member(variant, &attributes)) {
            members.push(member);
        }
    }
    errors.finish()?;

    check_overlaps(&members)?;

    let definition_name = args.name.clone().unwrap_or_else(|| enum_ident.unraw().to_string());
    check_definition(&enum_ident, &definition_name, args, &attributes, &members)?;

    Ok(generate(&enum_ident, &definition_name, args, &attributes, &members))
}

/// Turns the declared attribute paths into names, rejecting reserved ones
fn attribute_names(paths: &PathList) -> Result<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for path in paths.iter() {
        let name = match path.get_ident() {
            Some(ident) => ident.unraw().to_string(),
            None => return Err(Error::custom("attribute names must be plain identifiers").with_span(path)),
        };
        if BUILTIN_FIELDS.contains(&name.as_str()) {
            return Err(Error::custom(format!("attribute name `{name}` is reserved")).with_span(path));
        }
        if names.contains(&name) {
            return Err(Error::custom(format!("attribute `{name}` is declared more than once")).with_span(path));
        }
        names.push(name);
    }
    Ok(names)
}

/// Reads the range and attributes of a variant, removing the `range` attribute and the discriminant
fn parse_member(variant: &mut Variant, attributes: &[String]) -> Result<MemberDef> {
    if !matches!(variant.fields, Fields::Unit) {
        return Err(Error::custom("ranged_enum variants cannot carry fields").with_span(&variant.fields));
    }

    let range = Range::from_variant(variant)?;

    // remove the attribute after parsing it
    variant.attrs.retain(|attr| !attr.path().is_ident("range"));

    let discriminant = match variant.discriminant.take() {
        Some((_, expr)) => Some(parse_integer(&expr)?),
        None => None,
    };
    let value = range.value.as_ref().map(parse_integer).transpose()?;
    let start = range.start.as_ref().map(parse_integer).transpose()?;
    let end = range.end.as_ref().map(parse_integer).transpose()?;

    let ident = variant.ident.clone();
    let (low, high) = match (discriminant, value, start, end) {
        (Some(value), None, None, None) | (None, Some(value), None, None) => (value, value),
        (None, None, Some(start), Some(end)) => (start, end),
        (None, None, None, None) => {
            return Err(Error::custom(format!(
                "variant `{ident}` needs a discriminant or a #[range(..)] attribute"
            ))
            .with_span(&ident))
        }
        _ => {
            return Err(Error::custom(format!(
                "variant `{ident}` must give exactly one of a discriminant, `value`, or `start` and `end`"
            ))
            .with_span(&ident))
        }
    };
    if low > high {
        return Err(Error::custom(format!("range start {low} exceeds end {high}")).with_span(&ident));
    }

    let mut values = range.values;
    let mut attrs = Vec::with_capacity(attributes.len());
    for name in attributes {
        match values.remove(name) {
            Some(lit) => attrs.push(lit_value(&lit)?),
            None => {
                return Err(Error::custom(format!("variant `{ident}` is missing attribute `{name}`")).with_span(&ident))
            }
        }
    }
    if let Some(unknown) = values.keys().next() {
        return Err(Error::custom(format!("variant `{ident}` sets undeclared attribute `{unknown}`")).with_span(&ident));
    }

    Ok(MemberDef {
        name: ident.unraw().to_string(),
        ident,
        low,
        high,
        format: range.format,
        attrs,
    })
}

/// Reads an integer literal, possibly negated
fn parse_integer(expr: &Expr) -> Result<i64> {
    match expr {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Int(int) => Ok(int.base10_parse()?),
            other => Err(Error::custom("expected an integer literal").with_span(other)),
        },
        Expr::Unary(unary) if matches!(unary.op, UnOp::Neg(_)) => {
            let value = parse_integer(&unary.expr)?;
            value
                .checked_neg()
                .ok_or_else(|| Error::custom("integer literal is out of range").with_span(expr))
        }
        Expr::Group(group) => parse_integer(&group.expr),
        Expr::Paren(paren) => parse_integer(&paren.expr),
        other => Err(Error::custom("expected an integer literal").with_span(other)),
    }
}

/// Converts an attribute literal into the value stored on the member
fn lit_value(lit: &Lit) -> Result<Value> {
    Ok(match lit {
        Lit::Str(text) => Value::Str(text.value()),
        Lit::Int(int) => Value::Int(int.base10_parse()?),
        Lit::Float(float) => Value::Float(float.base10_parse()?),
        Lit::Bool(flag) => Value::Bool(flag.value),
        other => return Err(Error::custom("unsupported attribute literal").with_span(other)),
    })
}

/// Generates the expression rebuilding `value` at run time
fn value_tokens(value: &Value) -> TokenStream2 {
    match value {
        Value::Bool(flag) => quote!(::ranged_enum::Value::Bool(#flag)),
        Value::Int(int) => quote!(::ranged_enum::Value::Int(#int)),
        Value::Float(float) => quote!(::ranged_enum::Value::Float(#float)),
        Value::Str(text) => quote!(::ranged_enum::Value::Str(::std::string::String::from(#text))),
        Value::Seq(items) => {
            let items = items.iter().map(value_tokens);
            quote!(::ranged_enum::Value::Seq(::std::vec![#(#items),*]))
        }
    }
}

/// Rejects overlapping or touching ranges, pointing at the later variant
fn check_overlaps(members: &[MemberDef]) -> Result<()> {
    let mut sorted: Vec<&MemberDef> = members.iter().collect();
    sorted.sort_by_key(|member| member.low);

    for pair in sorted.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev.high >= next.low {
            return Err(Error::custom(format!(
                "range {}..{} of `{}` overlaps range {}..{} of `{}`",
                next.low, next.high, next.ident, prev.low, prev.high, prev.ident
            ))
            .with_span(&next.ident));
        }
    }
    Ok(())
}

/// Builds the definition once during expansion so names and format templates fail at compile time
fn check_definition(
    enum_ident: &Ident,
    definition_name: &str,
    args: &EnumArgs,
    attributes: &[String],
    members: &[MemberDef],
) -> Result<()> {
    let mut builder = EnumBuilder::new(definition_name).attributes(attributes.iter().cloned());
    if let Some(format) = &args.format {
        builder = builder.format(format.clone());
    }
    for member in members {
        builder = match &member.format {
            Some(format) => builder.member_with_format(member.name.clone(), member.descriptor(), format.clone()),
            None => builder.member(member.name.clone(), member.descriptor()),
        };
    }

    builder.build().map(|_| ()).map_err(|err| {
        let span = failing_member(&err)
            .and_then(|name| members.iter().find(|member| member.name == name))
            .map_or(enum_ident, |member| &member.ident);
        Error::custom(err.to_string()).with_span(span)
    })
}

/// The member a build error is about, if any
fn failing_member(err: &ranged_enum::Error) -> Option<&str> {
    use ranged_enum::Error::*;
    match err {
        InvalidRange { member, .. } => member.as_deref(),
        DescriptorType { member, .. } | DescriptorArity { member, .. } | InvalidFormatSpec { member, .. } => {
            Some(member.as_str())
        }
        InvalidMemberName { name } | DuplicateName { name } => Some(name.as_str()),
        OverlappingRanges { second, .. } => Some(second.as_str()),
        _ => None,
    }
}

/// Generates the definition accessor and the per-variant API
fn generate(
    enum_ident: &Ident,
    definition_name: &str,
    args: &EnumArgs,
    attributes: &[String],
    members: &[MemberDef],
) -> TokenStream2 {
    let attributes_call = if attributes.is_empty() {
        quote!()
    } else {
        quote!(.attributes([#(#attributes),*]))
    };
    let format_call = match &args.format {
        Some(format) => quote!(.format(#format)),
        None => quote!(),
    };

    let member_calls = members.iter().map(|member| {
        let name = &member.name;
        let descriptor = value_tokens(&member.descriptor());
        match &member.format {
            Some(format) => quote!(.member_with_format(#name, #descriptor, #format)),
            None => quote!(.member(#name, #descriptor)),
        }
    });

    let idents: Vec<&Ident> = members.iter().map(|member| &member.ident).collect();
    let names: Vec<&str> = members.iter().map(|member| member.name.as_str()).collect();

    // positions in the definition follow ascending lower bounds
    let mut sorted: Vec<&MemberDef> = members.iter().collect();
    sorted.sort_by_key(|member| member.low);
    let sorted_idents: Vec<&Ident> = sorted.iter().map(|member| &member.ident).collect();
    let positions: Vec<usize> = (0..sorted.len()).collect();
    let count = sorted.len();

    quote! {
        impl #enum_ident {
            /// Variants in ascending order of their ranges.
            pub const MEMBERS: [Self; #count] = [#(Self::#sorted_idents),*];

            /// The definition backing this enum, built on first use.
            pub fn definition() -> &'static ::ranged_enum::EnumDefinition {
                static DEFINITION: ::ranged_enum::__private::Lazy<::ranged_enum::EnumDefinition> =
                    ::ranged_enum::__private::Lazy::new(|| {
                        ::ranged_enum::EnumBuilder::new(#definition_name)
                            #attributes_call
                            #format_call
                            #(#member_calls)*
                            .build()
                            // the same descriptors were built successfully during expansion
                            .unwrap_or_else(|err| ::std::panic!("invalid ranged enum {}: {}", #definition_name, err))
                    });
                &DEFINITION
            }

            pub fn member(&self) -> &'static ::ranged_enum::Member {
                &Self::definition().members()[self.position()]
            }

            pub fn name(&self) -> &'static str {
                match self {
                    #(Self::#idents => #names,)*
                }
            }

            pub fn range(&self) -> ::ranged_enum::Subrange {
                self.member().range()
            }

            pub fn contains(&self, value: i64) -> bool {
                self.member().contains(value)
            }

            /// Finds the variant whose range contains `value`.
            pub fn try_resolve(value: i64) -> ::std::option::Option<Self> {
                Self::definition()
                    .try_resolve(value)
                    .and_then(|member| Self::from_position(member.position()))
            }

            /// Finds the variant whose range contains `value`, failing with `ValueNotFound`.
            pub fn resolve(value: i64) -> ::ranged_enum::Result<Self> {
                Self::try_resolve(value).ok_or_else(|| ::ranged_enum::Error::ValueNotFound {
                    value,
                    definition: ::std::string::ToString::to_string(Self::definition().name()),
                })
            }

            fn position(&self) -> usize {
                match self {
                    #(Self::#sorted_idents => #positions,)*
                }
            }

            fn from_position(position: usize) -> ::std::option::Option<Self> {
                match position {
                    #(#positions => ::std::option::Option::Some(Self::#sorted_idents),)*
                    _ => ::std::option::Option::None,
                }
            }
        }

        impl ::std::convert::TryFrom<i64> for #enum_ident {
            type Error = ::ranged_enum::Error;

            fn try_from(value: i64) -> ::std::result::Result<Self, Self::Error> {
                Self::resolve(value)
            }
        }

        impl ::std::fmt::Display for #enum_ident {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(self.member(), f)
            }
        }
    }
}
