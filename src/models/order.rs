use super::address::{normalize_address, validate_address};
use super::REQUIRED;
use crate::entities::{order, order_item};
use crate::errors::FieldErrors;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a place-order request. Empty `items` means "use the cart".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default, alias = "address")]
    pub endereco: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: i64,
    pub quantity: i32,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedOrder {
    pub lines: Vec<OrderLine>,
    pub endereco: Value,
}

/// Checks, in order: the user id, the item list, the address presence, then each
/// address field. Every problem found is reported.
pub fn validate_order_request(
    user_id: i64,
    items: &[Value],
    endereco: Option<Value>,
) -> Result<ValidatedOrder, FieldErrors> {
    let mut errors = FieldErrors::new();

    if user_id <= 0 {
        errors.insert("user_id".into(), "usuário inválido".into());
    }

    let mut lines = Vec::with_capacity(items.len());
    if items.is_empty() {
        errors.insert("items".into(), "o pedido deve ter ao menos um item".into());
    }
    for (index, item) in items.iter().enumerate() {
        match parse_line(item) {
            Ok(line) => lines.push(line),
            Err((field, message)) => {
                errors.insert(format!("items[{}].{}", index, field), message);
            }
        }
    }

    let endereco = match endereco {
        None | Some(Value::Null) => {
            errors.insert("endereco".into(), REQUIRED.into());
            Value::Null
        }
        Some(raw) => {
            let normalized = normalize_address(raw);
            validate_address(&normalized, "endereco", &mut errors);
            normalized
        }
    };

    if errors.is_empty() {
        Ok(ValidatedOrder { lines, endereco })
    } else {
        Err(errors)
    }
}

fn parse_line(item: &Value) -> Result<OrderLine, (&'static str, String)> {
    let product_id = match item.get("product_id").or_else(|| item.get("produto_id")) {
        Some(value) => as_integer(value),
        None => return Err(("product_id", REQUIRED.to_string())),
    };
    let product_id = match product_id {
        Some(id) if id > 0 => id,
        _ => return Err(("product_id", "deve ser um inteiro positivo".to_string())),
    };

    let quantity = match item.get("quantity").or_else(|| item.get("quantidade")) {
        None | Some(Value::Null) => 1,
        Some(value) => match as_integer(value) {
            Some(q) if q >= 1 && q <= i32::MAX as i64 => q as i32,
            _ => return Err(("quantity", "deve ser no mínimo 1".to_string())),
        },
    };

    Ok(OrderLine {
        product_id,
        quantity,
    })
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Order with its snapshot lines, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Why a requested line did not make it into the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    NotFound,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedItem {
    pub product_id: i64,
    pub quantity: i32,
    pub reason: DropReason,
}

/// Result of placing an order: what was persisted and what was left out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacement {
    pub order: OrderDetails,
    pub dropped_items: Vec<DroppedItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn address() -> Value {
        json!({
            "rua": "Rua das Flores",
            "numero": "10",
            "bairro": "Centro",
            "cidade": "Curitiba",
            "estado": "PR",
            "cep": "80010000"
        })
    }

    #[test]
    fn defaults_quantity_to_one() {
        let order = validate_order_request(3, &[json!({"product_id": 7})], Some(address())).unwrap();
        assert_eq!(
            order.lines,
            vec![OrderLine {
                product_id: 7,
                quantity: 1
            }]
        );
    }

    #[test]
    fn reports_missing_pieces_together() {
        let errors = validate_order_request(0, &[], None).unwrap_err();
        let keys: Vec<_> = errors.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["endereco", "items", "user_id"]);
    }

    #[test]
    fn reports_bad_lines_and_address_fields() {
        let items = [json!({"product_id": "x"}), json!({"product_id": 2, "quantity": 0})];
        let errors =
            validate_order_request(1, &items, Some(json!({"rua": "Rua A"}))).unwrap_err();
        assert!(errors.contains_key("items[0].product_id"));
        assert!(errors.contains_key("items[1].quantity"));
        assert!(errors.contains_key("endereco.cidade"));
        assert!(!errors.contains_key("endereco.rua"));
    }
}
