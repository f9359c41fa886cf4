//! Format rules controlling how members render as text.
//!
//! A rule is either a [`Template`], a small field-substitution language, or a
//! caller-supplied callback receiving the member's [`Fields`].
//!
//! Templates contain literal text, `{{`/`}}` escapes and replacement fields
//! of the form `{field[!conversion][:spec]}`:
//!
//! - `field` is one of `low` (alias `min`), `high` (alias `max`), `value`
//!   (the whole subrange), `name`, or a declared attribute name,
//! - `conversion` is `s` (plain text) or `r` (quoted representation),
//! - `spec` is `[[fill]align][sign][#][0][width][.precision][type]` with
//!   `type` one of `d x X o b s f F e E g G %`.
//!
//! Floats without a type render as their shortest round-trip text; with a
//! precision they follow `g`, keeping at least one fractional digit in
//! fixed notation: `{weight:.2}` renders `3.14159` as `3.1` and `100.0` as
//! `1e+02`.
//!
//! A numeric spec on `value` applies to each bound: `"0x{value:02X}"` over
//! `3..10` renders `0x03..0A`.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::member::Member;
use crate::subrange::Subrange;
use crate::value::Value;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

static FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<name>[^!:]*)(?:!(?P<conv>[^:]*))?(?::(?P<spec>.*))?$").unwrap());

static SPEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?P<fill>.)?(?P<align>[<>=^]))?(?P<sign>[-+ ])?(?P<alt>#)?(?P<zero>0)?(?P<width>[0-9]+)?(?:\.(?P<precision>[0-9]+))?(?P<ty>[bdoxXsfFeEgG%])?$",
    )
    .unwrap()
});

/// Names of the fields every member provides.
pub const BUILTIN_FIELDS: &[&str] = &["low", "high", "min", "max", "value", "name"];

pub(crate) fn is_identifier(text: &str) -> bool {
    IDENTIFIER.is_match(text)
}

/// A field value as seen by format rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Int(i64),
    Range(Subrange),
    Text(&'a str),
    Value(&'a Value),
}

impl FieldValue<'_> {
    fn repr(&self) -> String {
        match self {
            FieldValue::Int(value) => value.to_string(),
            FieldValue::Range(range) => range.to_string(),
            FieldValue::Text(text) => Value::Str((*text).to_owned()).repr(),
            FieldValue::Value(value) => value.repr(),
        }
    }
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(value) => write!(f, "{value}"),
            FieldValue::Range(range) => write!(f, "{range}"),
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Value(value) => write!(f, "{value}"),
        }
    }
}

/// The field-name to value mapping of one member.
#[derive(Debug, Clone, Copy)]
pub struct Fields<'a> {
    member: &'a Member,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(member: &'a Member) -> Self {
        Self { member }
    }

    pub fn member(&self) -> &'a Member {
        self.member
    }

    pub fn get(&self, field: &str) -> Option<FieldValue<'a>> {
        let member = self.member;
        match field {
            "low" | "min" => Some(FieldValue::Int(member.low())),
            "high" | "max" => Some(FieldValue::Int(member.high())),
            "value" => Some(FieldValue::Range(member.range())),
            "name" => Some(FieldValue::Text(member.name())),
            other => member.attr(other).map(FieldValue::Value),
        }
    }

    /// Built-in fields (without aliases) followed by attributes in declared order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, FieldValue<'a>)> + 'a {
        let member = self.member;
        let builtins = [
            ("low", FieldValue::Int(member.low())),
            ("high", FieldValue::Int(member.high())),
            ("value", FieldValue::Range(member.range())),
            ("name", FieldValue::Text(member.name())),
        ];
        builtins.into_iter().chain(
            member
                .attributes()
                .map(|(name, value)| (name, FieldValue::Value(value))),
        )
    }
}

type Callback = dyn Fn(&Fields<'_>) -> String + Send + Sync;

/// How a member renders through `Display`.
#[derive(Clone)]
pub enum FormatRule {
    Template(Template),
    Callback(Arc<Callback>),
}

impl FormatRule {
    /// Parses a template rule.
    pub fn template(source: &str) -> Result<Self> {
        Template::parse(source).map(FormatRule::Template)
    }

    pub fn callback<F>(render: F) -> Self
    where
        F: Fn(&Fields<'_>) -> String + Send + Sync + 'static,
    {
        FormatRule::Callback(Arc::new(render))
    }

    /// Checks that every referenced field exists given the declared attributes.
    pub fn check_fields(&self, attributes: &[String]) -> Result<()> {
        match self {
            FormatRule::Template(template) => template.check_fields(attributes),
            FormatRule::Callback(_) => Ok(()),
        }
    }

    pub fn render(&self, member: &Member) -> Result<String> {
        let fields = Fields::new(member);
        match self {
            FormatRule::Template(template) => template.render(&fields),
            FormatRule::Callback(render) => Ok(render(&fields)),
        }
    }
}

impl Default for FormatRule {
    /// Renders the whole subrange: `3..10`, or `1` for singletons.
    fn default() -> Self {
        FormatRule::Template(Template {
            source: "{value}".to_owned(),
            segments: vec![Segment::Field(FieldRef {
                name: "value".to_owned(),
                conversion: None,
                spec: FormatSpec::default(),
                raw_spec: String::new(),
            })],
        })
    }
}

impl fmt::Debug for FormatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatRule::Template(template) => f.debug_tuple("Template").field(&template.source).finish(),
            FormatRule::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// A parsed format template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field(FieldRef),
}

#[derive(Debug, Clone, PartialEq)]
struct FieldRef {
    name: String,
    conversion: Option<Conversion>,
    spec: FormatSpec,
    raw_spec: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Str,
    Repr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    AfterSign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Sign {
    #[default]
    Minus,
    Plus,
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<Align>,
    sign: Sign,
    alternate: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
    ty: Option<char>,
}

impl FormatSpec {
    fn is_empty(&self) -> bool {
        *self == FormatSpec::default()
    }

    fn parse(spec: &str) -> Option<Self> {
        let caps = SPEC.captures(spec)?;
        let number = |group: &str| -> Option<Option<usize>> {
            match caps.name(group) {
                Some(digits) => digits.as_str().parse().ok().map(Some),
                None => Some(None),
            }
        };
        Some(Self {
            fill: caps.name("fill").and_then(|m| m.as_str().chars().next()),
            align: caps.name("align").map(|m| match m.as_str() {
                "<" => Align::Left,
                ">" => Align::Right,
                "^" => Align::Center,
                _ => Align::AfterSign,
            }),
            sign: match caps.name("sign").map(|m| m.as_str()) {
                Some("+") => Sign::Plus,
                Some(" ") => Sign::Space,
                _ => Sign::Minus,
            },
            alternate: caps.name("alt").is_some(),
            zero: caps.name("zero").is_some(),
            width: number("width")?,
            precision: number("precision")?,
            ty: caps.name("ty").and_then(|m| m.as_str().chars().next()),
        })
    }

    /// Pads `prefix` (sign, radix marker) and `body` to the requested width.
    fn pad(&self, prefix: &str, body: &str, default_align: Align) -> String {
        let len = prefix.chars().count() + body.chars().count();
        let width = self.width.unwrap_or(0);
        if len >= width {
            return format!("{prefix}{body}");
        }
        let missing = width - len;
        let (fill, align) = match (self.align, self.zero) {
            (Some(align), _) => (self.fill.unwrap_or(' '), align),
            (None, true) => ('0', Align::AfterSign),
            (None, false) => (' ', default_align),
        };
        let run = |n: usize| -> String { std::iter::repeat(fill).take(n).collect() };
        match align {
            Align::Left => format!("{prefix}{body}{}", run(missing)),
            Align::Right => format!("{}{prefix}{body}", run(missing)),
            Align::Center => format!(
                "{}{prefix}{body}{}",
                run(missing / 2),
                run(missing - missing / 2)
            ),
            Align::AfterSign => format!("{prefix}{}{body}", run(missing)),
        }
    }

    fn sign_of(&self, negative: bool) -> &'static str {
        match (negative, self.sign) {
            (true, _) => "-",
            (false, Sign::Plus) => "+",
            (false, Sign::Space) => " ",
            (false, Sign::Minus) => "",
        }
    }

    fn format_text(&self, text: &str) -> Result<String, &'static str> {
        if !matches!(self.ty, None | Some('s')) {
            return Err("numeric presentation type on a text value");
        }
        if self.sign != Sign::Minus || self.alternate {
            return Err("sign and '#' are not allowed for text values");
        }
        if self.align == Some(Align::AfterSign) || (self.zero && self.align.is_none()) {
            return Err("'=' alignment is not allowed for text values");
        }
        let text: String = match self.precision {
            Some(max) => text.chars().take(max).collect(),
            None => text.to_owned(),
        };
        Ok(self.pad("", &text, Align::Left))
    }

    fn format_int(&self, value: i64) -> Result<String, &'static str> {
        let magnitude = value.unsigned_abs();
        let (marker, digits) = match self.ty {
            None | Some('d') => ("", magnitude.to_string()),
            Some('x') => ("0x", format!("{magnitude:x}")),
            Some('X') => ("0X", format!("{magnitude:X}")),
            Some('o') => ("0o", format!("{magnitude:o}")),
            Some('b') => ("0b", format!("{magnitude:b}")),
            Some('s') => return Err("'s' presentation type on an integer value"),
            Some(_) => return self.format_float(value as f64),
        };
        if self.precision.is_some() {
            return Err("precision is not allowed for integer values");
        }
        let marker = if self.alternate { marker } else { "" };
        let prefix = format!("{}{marker}", self.sign_of(value < 0));
        Ok(self.pad(&prefix, &digits, Align::Right))
    }

    fn format_float(&self, value: f64) -> Result<String, &'static str> {
        let magnitude = value.abs();
        let body = if !value.is_finite() {
            let text = if value.is_nan() { "nan" } else { "inf" };
            match self.ty {
                Some('F' | 'E' | 'G') => text.to_uppercase(),
                Some('%') => format!("{text}%"),
                _ => text.to_owned(),
            }
        } else {
            match self.ty {
                Some('f' | 'F') => format!("{magnitude:.*}", self.precision.unwrap_or(6)),
                Some('%') => format!("{:.*}%", self.precision.unwrap_or(6), magnitude * 100.0),
                Some(exp @ ('e' | 'E')) => exponent(magnitude, self.precision.unwrap_or(6), exp == 'E'),
                Some(ty @ ('g' | 'G')) => {
                    let digits = self.precision.unwrap_or(6);
                    general(magnitude, digits, digits, ty == 'G', self.alternate)
                }
                None => match self.precision {
                    Some(digits) => {
                        let text = general(magnitude, digits, digits.saturating_sub(1), false, self.alternate);
                        if text.contains(['.', 'e']) {
                            text
                        } else {
                            format!("{text}.0")
                        }
                    }
                    None => format!("{magnitude:?}"),
                },
                Some(_) => return Err("integer presentation type on a float value"),
            }
        };
        let negative = value.is_sign_negative() && !value.is_nan();
        Ok(self.pad(self.sign_of(negative), &body, Align::Right))
    }

    fn format_range(&self, range: Subrange) -> Result<String, &'static str> {
        if self.is_empty() {
            return Ok(range.to_string());
        }
        let low = self.format_int(range.low())?;
        if range.is_singleton() {
            return Ok(low);
        }
        Ok(format!("{low}..{}", self.format_int(range.high())?))
    }

    fn format_value(&self, value: &Value) -> Result<String, &'static str> {
        match value {
            Value::Int(value) => self.format_int(*value),
            Value::Float(value) => self.format_float(*value),
            Value::Str(text) => self.format_text(text),
            Value::Bool(_) if self.is_empty() => Ok(value.to_string()),
            Value::Bool(flag) => self.format_int(i64::from(*flag)),
            Value::Seq(_) if self.is_empty() => Ok(value.repr()),
            Value::Seq(_) => Err("sequence values accept no format spec"),
        }
    }

    fn format_field(&self, value: FieldValue<'_>) -> Result<String, &'static str> {
        match value {
            FieldValue::Int(value) => self.format_int(value),
            FieldValue::Range(range) => self.format_range(range),
            FieldValue::Text(text) => self.format_text(text),
            FieldValue::Value(value) => self.format_value(value),
        }
    }
}

/// Renders `magnitude` with `digits` significant digits, in fixed notation when its
/// decimal exponent lies in `-4..fixed_below` and in scientific notation otherwise.
/// Trailing zeros are dropped unless `alternate`.
fn general(magnitude: f64, digits: usize, fixed_below: usize, upper: bool, alternate: bool) -> String {
    let digits = digits.max(1);
    let raw = format!("{magnitude:.*e}", digits - 1);
    let exp: i64 = raw.split_once('e').and_then(|(_, exp)| exp.parse().ok()).unwrap_or(0);

    let (mantissa, suffix) = if (-4..fixed_below as i64).contains(&exp) {
        let decimals = (digits as i64 - 1 - exp).max(0) as usize;
        (format!("{magnitude:.decimals$}"), String::new())
    } else {
        let text = exponent(magnitude, digits - 1, upper);
        let marker = if upper { 'E' } else { 'e' };
        match text.split_once(marker) {
            Some((mantissa, exp)) => (mantissa.to_owned(), format!("{marker}{exp}")),
            None => (text, String::new()),
        }
    };

    let mantissa = if alternate {
        if mantissa.contains('.') {
            mantissa
        } else {
            format!("{mantissa}.")
        }
    } else if mantissa.contains('.') {
        mantissa.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        mantissa
    };
    format!("{mantissa}{suffix}")
}

/// Renders `magnitude` in scientific notation with a signed two-digit exponent.
fn exponent(magnitude: f64, precision: usize, upper: bool) -> String {
    let raw = format!("{magnitude:.precision$e}");
    let (mantissa, exp) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let marker = if upper { 'E' } else { 'e' };
    format!("{mantissa}{marker}{sign}{:02}", exp.unsigned_abs())
}

impl Template {
    /// Parses `source` without checking field names.
    pub fn parse(source: &str) -> Result<Self> {
        let syntax = |offset: usize, reason: &'static str| Error::FormatSyntax {
            template: source.to_owned(),
            offset,
            reason,
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();
        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if chars.next_if(|&(_, next)| next == '{').is_some() => literal.push('{'),
                '}' if chars.next_if(|&(_, next)| next == '}').is_some() => literal.push('}'),
                '}' => return Err(syntax(offset, "single '}' encountered")),
                '{' => {
                    let mut body = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((inner, '{')) => {
                                return Err(syntax(inner, "nested replacement fields are not supported"))
                            }
                            Some((_, c)) => body.push(c),
                            None => return Err(syntax(offset, "unterminated replacement field")),
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(parse_field(&body).map_err(|reason| syntax(offset, reason))?));
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of the referenced fields, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Field(field) => Some(field.name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn check_fields(&self, attributes: &[String]) -> Result<()> {
        for field in self.fields() {
            if !BUILTIN_FIELDS.contains(&field) && !attributes.iter().any(|name| name == field) {
                return Err(Error::UnknownField {
                    template: self.source.clone(),
                    field: field.to_owned(),
                });
            }
        }
        Ok(())
    }

    pub fn render(&self, fields: &Fields<'_>) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => out.push_str(&field.render(fields, &self.source)?),
            }
        }
        Ok(out)
    }
}

impl FieldRef {
    fn render(&self, fields: &Fields<'_>, template: &str) -> Result<String> {
        let value = fields.get(&self.name).ok_or_else(|| Error::UnknownField {
            template: template.to_owned(),
            field: self.name.clone(),
        })?;
        let rendered = match self.conversion {
            Some(Conversion::Str) => self.spec.format_text(&value.to_string()),
            Some(Conversion::Repr) => self.spec.format_text(&value.repr()),
            None => self.spec.format_field(value),
        };
        rendered.map_err(|reason| Error::InvalidFormatSpec {
            member: fields.member().name().to_owned(),
            field: self.name.clone(),
            spec: self.raw_spec.clone(),
            reason,
        })
    }
}

fn parse_field(body: &str) -> Result<FieldRef, &'static str> {
    let caps = FIELD.captures(body).ok_or("malformed replacement field")?;
    let name = caps.name("name").map_or("", |m| m.as_str());
    if name.is_empty() {
        return Err("replacement fields must name a field");
    }
    if !is_identifier(name) {
        return Err("field name must be an identifier");
    }
    let conversion = match caps.name("conv").map(|m| m.as_str()) {
        None => None,
        Some("s") => Some(Conversion::Str),
        Some("r") => Some(Conversion::Repr),
        Some(_) => return Err("unknown conversion, expected 's' or 'r'"),
    };
    let raw_spec = caps.name("spec").map_or("", |m| m.as_str());
    let spec = FormatSpec::parse(raw_spec).ok_or("invalid format spec")?;
    Ok(FieldRef {
        name: name.to_owned(),
        conversion,
        spec,
        raw_spec: raw_spec.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(text: &str) -> FormatSpec {
        FormatSpec::parse(text).unwrap()
    }

    #[test]
    fn parses_literals_and_escapes() {
        let template = Template::parse("{{{name}}} = {value}").unwrap();
        assert_eq!(template.fields().collect::<Vec<_>>(), ["name", "value"]);
        assert_eq!(
            template.segments[0],
            Segment::Literal("{".to_owned())
        );
    }

    #[test]
    fn rejects_malformed_templates() {
        for (source, reason) in [
            ("{name", "unterminated replacement field"),
            ("name}", "single '}' encountered"),
            ("{}", "replacement fields must name a field"),
            ("{0.value}", "field name must be an identifier"),
            ("{name!x}", "unknown conversion, expected 's' or 'r'"),
            ("{min:02Q}", "invalid format spec"),
        ] {
            match Template::parse(source) {
                Err(Error::FormatSyntax { reason: got, .. }) => assert_eq!(got, reason, "{source}"),
                other => panic!("{source}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_fields_are_reported() {
        let template = Template::parse("{value} {brief!r}").unwrap();
        assert!(template.check_fields(&["brief".to_owned()]).is_ok());
        assert_eq!(
            template.check_fields(&[]),
            Err(Error::UnknownField {
                template: "{value} {brief!r}".to_owned(),
                field: "brief".to_owned(),
            })
        );
    }

    #[test]
    fn integer_specs() {
        assert_eq!(spec("02X").format_int(10).unwrap(), "0A");
        assert_eq!(spec("#06x").format_int(255).unwrap(), "0x00ff");
        assert_eq!(spec("+d").format_int(7).unwrap(), "+7");
        assert_eq!(spec("05").format_int(-42).unwrap(), "-0042");
        assert_eq!(spec("*^7").format_int(42).unwrap(), "**42***");
        assert_eq!(spec("<4").format_int(1).unwrap(), "1   ");
        assert_eq!(spec("b").format_int(5).unwrap(), "101");
        assert!(spec("s").format_int(5).is_err());
        assert!(spec(".2d").format_int(5).is_err());
    }

    #[test]
    fn float_specs() {
        assert_eq!(spec(".2f").format_float(3.14159).unwrap(), "3.14");
        assert_eq!(spec("e").format_float(1500.0).unwrap(), "1.500000e+03");
        assert_eq!(spec(".1E").format_float(0.00025).unwrap(), "2.5E-04");
        assert_eq!(spec(".0%").format_float(0.25).unwrap(), "25%");
        assert_eq!(spec("").format_float(2.5).unwrap(), "2.5");
        assert!(spec("x").format_float(2.5).is_err());
    }

    #[test]
    fn general_float_specs() {
        assert_eq!(spec("g").format_float(1500.0).unwrap(), "1500");
        assert_eq!(spec("g").format_float(0.00001).unwrap(), "1e-05");
        assert_eq!(spec(".3g").format_float(1234.5).unwrap(), "1.23e+03");
        assert_eq!(spec("G").format_float(1e20).unwrap(), "1E+20");
        assert_eq!(spec("#g").format_float(2.0).unwrap(), "2.00000");
        assert_eq!(spec("g").format_float(-0.5).unwrap(), "-0.5");
        assert_eq!(spec("g").format_int(42).unwrap(), "42");
    }

    #[test]
    fn precision_without_type_is_general() {
        assert_eq!(spec(".2").format_float(3.14159).unwrap(), "3.1");
        assert_eq!(spec(".2").format_float(100.0).unwrap(), "1e+02");
        assert_eq!(spec(".3").format_float(10.0).unwrap(), "10.0");
        assert_eq!(spec(".3").format_float(1.5).unwrap(), "1.5");
    }

    #[test]
    fn text_specs() {
        assert_eq!(spec(">6").format_text("abc").unwrap(), "   abc");
        assert_eq!(spec("6").format_text("abc").unwrap(), "abc   ");
        assert_eq!(spec(".2").format_text("abc").unwrap(), "ab");
        assert!(spec("X").format_text("abc").is_err());
        assert!(spec("06").format_text("abc").is_err());
    }

    #[test]
    fn range_spec_applies_per_bound() {
        let range = Subrange::new(3, 10).unwrap();
        assert_eq!(spec("02X").format_range(range).unwrap(), "03..0A");
        assert_eq!(spec("").format_range(range).unwrap(), "3..10");
        assert_eq!(spec("02X").format_range(Subrange::singleton(15)).unwrap(), "0F");
    }
}
