//! Built-in filter kinds: text, select, multi-select, boolean, date range and
//! number range.

use chrono::NaiveDate;
use sea_orm::{
    Condition,
    sea_query::{Expr, SimpleExpr},
};

use super::conditions::{array_contains, like_predicate, typed_value, upper_eq};
use super::kinds::{
    ColumnMeta, FilterData, FilterKind, FilterOperator, FilterOptions, FilterTarget, FilterValue,
    Number, RawFilterInput,
};
use crate::schema::AttributeType;

const DATE_FORMAT: &str = "%Y-%m-%d";

fn is_texty(attribute_type: Option<&AttributeType>) -> bool {
    matches!(
        attribute_type,
        None | Some(AttributeType::Text | AttributeType::Enum(_) | AttributeType::Json)
    )
}

fn single(expr: SimpleExpr) -> Condition {
    Condition::all().add(expr)
}

fn is_array(attribute_type: Option<&AttributeType>) -> bool {
    matches!(attribute_type, Some(AttributeType::Array(_)))
}

fn element_type(attribute_type: Option<&AttributeType>) -> Option<&AttributeType> {
    match attribute_type {
        Some(AttributeType::Array(inner)) => Some(inner),
        other => other,
    }
}

/// Free text with contains/starts-with/ends-with/equals matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFilter;

impl TextFilter {
    fn is_text_operator(operator: FilterOperator) -> bool {
        matches!(
            operator,
            FilterOperator::Contains
                | FilterOperator::StartsWith
                | FilterOperator::EndsWith
                | FilterOperator::Equals
        )
    }
}

impl FilterKind for TextFilter {
    fn render_hint(&self) -> &'static str {
        "text_input"
    }

    fn default_options(&self) -> FilterOptions {
        FilterOptions::new()
            .with("operator", FilterOperator::Contains.as_str())
            .with("case_sensitive", false)
    }

    fn process(&self, raw: &RawFilterInput, column: &ColumnMeta<'_>) -> Option<FilterValue> {
        let text = raw.first().filter(|text| !text.is_empty())?;
        let operator = column
            .options
            .str("operator")
            .and_then(FilterOperator::parse)
            .filter(|operator| Self::is_text_operator(*operator))
            .unwrap_or(FilterOperator::Contains);
        let case_sensitive = column.options.bool("case_sensitive").unwrap_or(false);
        Some(
            FilterValue::new(column.kind, FilterData::Text(text.to_string()), operator)
                .case_sensitive(case_sensitive),
        )
    }

    fn validate(&self, value: &FilterValue) -> bool {
        matches!(&value.value, FilterData::Text(text) if !text.trim().is_empty())
            && Self::is_text_operator(value.operator)
    }

    fn encode(&self, value: &FilterValue) -> RawFilterInput {
        match &value.value {
            FilterData::Text(text) => RawFilterInput::Single(text.clone()),
            _ => RawFilterInput::Single(String::new()),
        }
    }

    fn predicate(&self, target: &FilterTarget<'_>, value: &FilterValue) -> Option<Condition> {
        let FilterData::Text(text) = &value.value else {
            return None;
        };
        let case_sensitive = value.case_sensitive.unwrap_or(false);
        match value.operator {
            FilterOperator::Equals => Some(single(if is_texty(target.attribute_type) {
                if case_sensitive {
                    Expr::expr(target.expr.clone()).eq(text.as_str())
                } else {
                    upper_eq(target.expr.clone(), text)
                }
            } else {
                Expr::expr(target.expr.clone()).eq(typed_value(target.attribute_type, text))
            })),
            operator @ (FilterOperator::Contains
            | FilterOperator::StartsWith
            | FilterOperator::EndsWith) => Some(single(like_predicate(
                target.expr.clone(),
                target.backend,
                text,
                operator,
                case_sensitive,
            ))),
            _ => None,
        }
    }
}

/// One value out of a declared option list.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectFilter;

impl FilterKind for SelectFilter {
    fn render_hint(&self) -> &'static str {
        "select"
    }

    fn default_options(&self) -> FilterOptions {
        FilterOptions::new().with("options", serde_json::json!([]))
    }

    fn process(&self, raw: &RawFilterInput, column: &ColumnMeta<'_>) -> Option<FilterValue> {
        let choice = raw.first().filter(|choice| !choice.is_empty())?;
        let allowed = column.options.choices("options");
        if !allowed.is_empty() && !allowed.iter().any(|option| option == choice) {
            return None;
        }
        Some(FilterValue::new(
            column.kind,
            FilterData::Choice(choice.to_string()),
            FilterOperator::Equals,
        ))
    }

    fn validate(&self, value: &FilterValue) -> bool {
        matches!(&value.value, FilterData::Choice(choice) if !choice.is_empty())
            && value.operator == FilterOperator::Equals
    }

    fn encode(&self, value: &FilterValue) -> RawFilterInput {
        match &value.value {
            FilterData::Choice(choice) => RawFilterInput::Single(choice.clone()),
            _ => RawFilterInput::Single(String::new()),
        }
    }

    fn predicate(&self, target: &FilterTarget<'_>, value: &FilterValue) -> Option<Condition> {
        let FilterData::Choice(choice) = &value.value else {
            return None;
        };
        let typed = typed_value(element_type(target.attribute_type), choice);
        Some(single(if is_array(target.attribute_type) {
            array_contains(target.expr.clone(), typed, target.backend)
        } else {
            Expr::expr(target.expr.clone()).eq(typed)
        }))
    }
}

/// Several values, matched with any-of or all-of semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiSelectFilter;

impl FilterKind for MultiSelectFilter {
    fn render_hint(&self) -> &'static str {
        "checkbox_group"
    }

    fn default_options(&self) -> FilterOptions {
        FilterOptions::new()
            .with("options", serde_json::json!([]))
            .with("match", FilterOperator::Any.as_str())
    }

    fn process(&self, raw: &RawFilterInput, column: &ColumnMeta<'_>) -> Option<FilterValue> {
        let allowed = column.options.choices("options");
        let mut choices: Vec<String> = Vec::new();
        for choice in raw.list() {
            if (allowed.is_empty() || allowed.contains(&choice)) && !choices.contains(&choice) {
                choices.push(choice);
            }
        }
        if choices.is_empty() {
            return None;
        }
        let operator = match column.options.str("match").and_then(FilterOperator::parse) {
            Some(FilterOperator::All) => FilterOperator::All,
            _ => FilterOperator::Any,
        };
        Some(FilterValue::new(
            column.kind,
            FilterData::Choices(choices),
            operator,
        ))
    }

    fn validate(&self, value: &FilterValue) -> bool {
        matches!(&value.value, FilterData::Choices(choices) if !choices.is_empty())
            && matches!(value.operator, FilterOperator::Any | FilterOperator::All)
    }

    fn encode(&self, value: &FilterValue) -> RawFilterInput {
        match &value.value {
            FilterData::Choices(choices) => RawFilterInput::Single(choices.join(",")),
            _ => RawFilterInput::Single(String::new()),
        }
    }

    fn predicate(&self, target: &FilterTarget<'_>, value: &FilterValue) -> Option<Condition> {
        let FilterData::Choices(choices) = &value.value else {
            return None;
        };
        let element = element_type(target.attribute_type);
        let typed = choices.iter().map(|choice| typed_value(element, choice));

        if is_array(target.attribute_type) {
            let memberships = typed.map(|v| array_contains(target.expr.clone(), v, target.backend));
            let condition = if value.operator == FilterOperator::All {
                memberships.fold(Condition::all(), Condition::add)
            } else {
                memberships.fold(Condition::any(), Condition::add)
            };
            return Some(condition);
        }

        if value.operator == FilterOperator::All {
            Some(
                typed
                    .map(|v| Expr::expr(target.expr.clone()).eq(v))
                    .fold(Condition::all(), Condition::add),
            )
        } else {
            Some(single(Expr::expr(target.expr.clone()).is_in(typed)))
        }
    }
}

/// True/false. Blank or `any` means no filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanFilter;

impl BooleanFilter {
    fn parse(raw: &str) -> Option<bool> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        }
    }
}

impl FilterKind for BooleanFilter {
    fn render_hint(&self) -> &'static str {
        "radio_group"
    }

    fn is_empty(&self, raw: &RawFilterInput) -> bool {
        raw.first()
            .is_none_or(|value| value.is_empty() || value.eq_ignore_ascii_case("any"))
    }

    fn process(&self, raw: &RawFilterInput, column: &ColumnMeta<'_>) -> Option<FilterValue> {
        let flag = Self::parse(raw.first()?)?;
        Some(FilterValue::new(
            column.kind,
            FilterData::Boolean(flag),
            FilterOperator::Equals,
        ))
    }

    fn validate(&self, value: &FilterValue) -> bool {
        matches!(value.value, FilterData::Boolean(_)) && value.operator == FilterOperator::Equals
    }

    fn encode(&self, value: &FilterValue) -> RawFilterInput {
        match value.value {
            FilterData::Boolean(flag) => RawFilterInput::Single(flag.to_string()),
            _ => RawFilterInput::Single(String::new()),
        }
    }

    fn predicate(&self, target: &FilterTarget<'_>, value: &FilterValue) -> Option<Condition> {
        let FilterData::Boolean(flag) = value.value else {
            return None;
        };
        Some(single(Expr::expr(target.expr.clone()).eq(flag)))
    }
}

/// `from,to` dates, either side optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRangeFilter;

fn parse_date(raw: &str) -> Result<Option<NaiveDate>, ()> {
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(Some)
        .map_err(|_| ())
}

fn format_bound<T: ToString>(bound: Option<&T>) -> String {
    bound.map(ToString::to_string).unwrap_or_default()
}

impl FilterKind for DateRangeFilter {
    fn render_hint(&self) -> &'static str {
        "date_range"
    }

    fn is_empty(&self, raw: &RawFilterInput) -> bool {
        let (from, to) = raw.bounds();
        from.is_empty() && to.is_empty()
    }

    fn process(&self, raw: &RawFilterInput, column: &ColumnMeta<'_>) -> Option<FilterValue> {
        let (from, to) = raw.bounds();
        let from = parse_date(&from).ok()?;
        let to = parse_date(&to).ok()?;
        let value = FilterValue::new(
            column.kind,
            FilterData::DateRange { from, to },
            FilterOperator::Between,
        );
        self.validate(&value).then_some(value)
    }

    fn validate(&self, value: &FilterValue) -> bool {
        let FilterData::DateRange { from, to } = value.value else {
            return false;
        };
        value.operator == FilterOperator::Between
            && (from.is_some() || to.is_some())
            && match (from, to) {
                (Some(from), Some(to)) => from <= to,
                _ => true,
            }
    }

    fn encode(&self, value: &FilterValue) -> RawFilterInput {
        match &value.value {
            FilterData::DateRange { from, to } => RawFilterInput::Single(format!(
                "{},{}",
                format_bound(from.as_ref()),
                format_bound(to.as_ref())
            )),
            _ => RawFilterInput::Single(String::new()),
        }
    }

    fn predicate(&self, target: &FilterTarget<'_>, value: &FilterValue) -> Option<Condition> {
        let FilterData::DateRange { from, to } = value.value else {
            return None;
        };
        let mut condition = Condition::all();
        if matches!(target.attribute_type, Some(AttributeType::DateTime)) {
            // Inclusive upper day: everything before the next midnight.
            if let Some(start) = from.and_then(|day| day.and_hms_opt(0, 0, 0)) {
                condition = condition.add(Expr::expr(target.expr.clone()).gte(start));
            }
            if let Some(end) = to
                .and_then(|day| day.succ_opt())
                .and_then(|day| day.and_hms_opt(0, 0, 0))
            {
                condition = condition.add(Expr::expr(target.expr.clone()).lt(end));
            }
        } else {
            if let Some(from) = from {
                condition = condition.add(Expr::expr(target.expr.clone()).gte(from));
            }
            if let Some(to) = to {
                condition = condition.add(Expr::expr(target.expr.clone()).lte(to));
            }
        }
        (!condition.is_empty()).then_some(condition)
    }
}

/// `min,max` numbers, parsed according to the column's numeric type.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberRangeFilter;

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn parse_number(raw: &str, attribute_type: Option<&AttributeType>) -> Result<Option<Number>, ()> {
    if raw.is_empty() {
        return Ok(None);
    }
    match attribute_type {
        Some(AttributeType::Integer) => {
            if let Ok(value) = raw.parse::<i64>() {
                return Ok(Some(Number::Int(value)));
            }
            let value = raw.parse::<f64>().map_err(|_| ())?;
            if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                Ok(Some(Number::Int(value as i64)))
            } else {
                Err(())
            }
        }
        Some(AttributeType::Float | AttributeType::Decimal) => raw
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(|value| Some(Number::Float(value)))
            .ok_or(()),
        _ => raw
            .parse::<i64>()
            .map(Number::Int)
            .or_else(|_| {
                raw.parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
                    .map(Number::Float)
                    .ok_or(())
            })
            .map(Some),
    }
}

impl FilterKind for NumberRangeFilter {
    fn render_hint(&self) -> &'static str {
        "number_range"
    }

    fn is_empty(&self, raw: &RawFilterInput) -> bool {
        let (min, max) = raw.bounds();
        min.is_empty() && max.is_empty()
    }

    fn process(&self, raw: &RawFilterInput, column: &ColumnMeta<'_>) -> Option<FilterValue> {
        let (min, max) = raw.bounds();
        let min = parse_number(&min, column.attribute_type).ok()?;
        let max = parse_number(&max, column.attribute_type).ok()?;
        let value = FilterValue::new(
            column.kind,
            FilterData::NumberRange { min, max },
            FilterOperator::Between,
        );
        self.validate(&value).then_some(value)
    }

    fn validate(&self, value: &FilterValue) -> bool {
        let FilterData::NumberRange { min, max } = value.value else {
            return false;
        };
        value.operator == FilterOperator::Between
            && (min.is_some() || max.is_some())
            && match (min, max) {
                (Some(min), Some(max)) => min.as_f64() <= max.as_f64(),
                _ => true,
            }
    }

    fn encode(&self, value: &FilterValue) -> RawFilterInput {
        match &value.value {
            FilterData::NumberRange { min, max } => RawFilterInput::Single(format!(
                "{},{}",
                format_bound(min.as_ref()),
                format_bound(max.as_ref())
            )),
            _ => RawFilterInput::Single(String::new()),
        }
    }

    fn predicate(&self, target: &FilterTarget<'_>, value: &FilterValue) -> Option<Condition> {
        let FilterData::NumberRange { min, max } = value.value else {
            return None;
        };
        let mut condition = Condition::all();
        if let Some(min) = min {
            condition = condition.add(Expr::expr(target.expr.clone()).gte(min));
        }
        if let Some(max) = max {
            condition = condition.add(Expr::expr(target.expr.clone()).lte(max));
        }
        (!condition.is_empty()).then_some(condition)
    }
}
