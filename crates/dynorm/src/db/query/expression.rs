use crate::{
    db::query::{
        compile::{AccessPath, CompiledQuery},
        filter::{Condition, Operator},
    },
    value::Value,
};
use std::collections::BTreeMap;

///
/// Expression
///
/// DynamoDB-style rendering of a compiled query: expression text with
/// `#nN` attribute-name and `:vN` value placeholders, plus the maps that
/// resolve them. Names and values are shared between both expressions.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expression {
    pub key_condition: Option<String>,
    pub filter: Option<String>,
    pub names: BTreeMap<String, String>,
    pub values: BTreeMap<String, Value>,
}

impl CompiledQuery {
    /// Render both expressions with one shared placeholder space.
    #[must_use]
    pub fn render(&self) -> Expression {
        let mut builder = Builder::default();

        let key_condition = match &self.access {
            AccessPath::Query(key) => {
                let (attribute, value) = &key.partition;
                let mut parts = vec![builder.comparison(attribute, "=", value)];
                if let Some(sort) = &key.sort {
                    parts.push(builder.condition(sort));
                }
                Some(parts.join(" AND "))
            }
            AccessPath::Scan => None,
        };

        let filter = (!self.filter.is_empty()).then(|| {
            self.filter
                .iter()
                .map(|condition| builder.condition(condition))
                .collect::<Vec<_>>()
                .join(" AND ")
        });

        Expression {
            key_condition,
            filter,
            names: builder.names,
            values: builder.values,
        }
    }

    #[must_use]
    pub fn key_expression(&self) -> Option<String> {
        self.render().key_condition
    }

    #[must_use]
    pub fn filter_expression(&self) -> Option<String> {
        self.render().filter
    }
}

#[derive(Default)]
struct Builder {
    names: BTreeMap<String, String>,
    values: BTreeMap<String, Value>,
    name_index: BTreeMap<String, String>,
}

impl Builder {
    fn name(&mut self, attribute: &str) -> String {
        if let Some(placeholder) = self.name_index.get(attribute) {
            return placeholder.clone();
        }

        let placeholder = format!("#n{}", self.name_index.len());
        self.name_index
            .insert(attribute.to_string(), placeholder.clone());
        self.names.insert(placeholder.clone(), attribute.to_string());

        placeholder
    }

    fn value(&mut self, value: &Value) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value.clone());

        placeholder
    }

    fn comparison(&mut self, attribute: &str, symbol: &str, value: &Value) -> String {
        let name = self.name(attribute);
        let value = self.value(value);

        format!("{name} {symbol} {value}")
    }

    fn condition(&mut self, condition: &Condition) -> String {
        let attribute = condition.field.as_str();

        match condition.op {
            Operator::Eq => self.comparison(attribute, "=", &condition.value),
            Operator::Ne => self.comparison(attribute, "<>", &condition.value),
            Operator::Lt => self.comparison(attribute, "<", &condition.value),
            Operator::Lte => self.comparison(attribute, "<=", &condition.value),
            Operator::Gt => self.comparison(attribute, ">", &condition.value),
            Operator::Gte => self.comparison(attribute, ">=", &condition.value),
            Operator::In | Operator::NotIn => {
                let name = self.name(attribute);
                let operands = condition
                    .value
                    .as_list()
                    .unwrap_or_default()
                    .iter()
                    .map(|value| self.value(value))
                    .collect::<Vec<_>>()
                    .join(", ");

                if condition.op == Operator::In {
                    format!("{name} IN ({operands})")
                } else {
                    format!("NOT ({name} IN ({operands}))")
                }
            }
            Operator::Contains => {
                let name = self.name(attribute);
                let value = self.value(&condition.value);
                format!("contains({name}, {value})")
            }
            Operator::BeginsWith => {
                let name = self.name(attribute);
                let value = self.value(&condition.value);
                format!("begins_with({name}, {value})")
            }
            Operator::Exists => format!("attribute_exists({})", self.name(attribute)),
            Operator::NotExists => format!("attribute_not_exists({})", self.name(attribute)),
        }
    }
}
