//! Typed records for the back-office resources.
//!
//! Field names follow the server's JSON exactly. Audit and soft-delete fields
//! are read-only here; they are filtered out of every outgoing payload.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Resource;

macro_rules! impl_resource {
    ($($ty:ty),+ $(,)?) => {
        $(impl Resource for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })+
    };
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub department_name: String,
    #[serde(default)]
    pub department_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    pub position_name: String,
    #[serde(default)]
    pub position_description: Option<String>,
    #[serde(default)]
    pub total_employee: i64,
    #[serde(default)]
    pub head_of_position: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default, rename = "createAt", alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "updateAt", alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub name: String,
    // sic: server field name
    pub employee_adress: String,
    pub employee_gender: bool,
    pub employee_date_of_birth: String,
    #[serde(default)]
    pub department: Option<Department>,
    #[serde(default)]
    pub position: Option<Position>,
}

/// Create/update body for an employee; foreign keys by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeInput {
    pub name: String,
    pub employee_adress: String,
    pub employee_gender: bool,
    pub employee_date_of_birth: String,
    pub department_id: String,
    pub position_id: String,
    #[serde(default)]
    pub create_account: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngredientType {
    pub id: String,
    pub ingredient_type_name: String,
    #[serde(default)]
    pub ingredient_type_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub id: String,
    pub ingredient_name: String,
    #[serde(rename = "ingredientTypeID")]
    pub ingredient_type_id: String,
    #[serde(default)]
    pub ingredient_type: Option<IngredientType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DishType {
    #[serde(rename = "id")]
    pub id: String,
    pub dish_type_name: String,
    #[serde(default)]
    pub dish_type_description: Option<String>,
    #[serde(default)]
    pub dish_type_available: bool,
    #[serde(default, rename = "createAt", alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    pub provider_name: String,
    #[serde(default)]
    pub provider_description: Option<String>,
    #[serde(default)]
    pub provider_phone_number: Option<String>,
    #[serde(default)]
    pub provider_email: Option<String>,
    #[serde(default)]
    pub provider_address: Option<String>,
    #[serde(default)]
    pub provider_status: Option<String>,
    #[serde(default, rename = "createAt", alias = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "updateAt", alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: String,
    pub promotion_name: String,
    #[serde(default)]
    pub promotion_description: Option<String>,
    pub discount: f64,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub is_after_dish: bool,
    #[serde(rename = "dishID")]
    pub dish_id: String,
}

/// List-only: invoices are issued elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub invoice_date: String,
    pub total_cost: f64,
    #[serde(default)]
    pub order_note: Option<String>,
    pub employee_name: String,
    pub table_number: i64,
    #[serde(default)]
    pub promotion_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    pub dish_name: String,
    pub quantity: i64,
    pub total_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportInvoice {
    pub id: String,
    #[serde(rename = "Provider", default)]
    pub provider: Option<Provider>,
    #[serde(rename = "Employee", default)]
    pub employee: Option<Employee>,
    pub import_date: String,
    pub total_expense: f64,
    #[serde(default)]
    pub import_invoice_detail: Vec<ImportInvoiceDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportInvoiceDetail {
    pub id: String,
    #[serde(rename = "importInvoiceID")]
    pub import_invoice_id: String,
    #[serde(rename = "ingredientID")]
    pub ingredient_id: String,
    pub quantity: f64,
    pub total_expense: f64,
}

impl_resource!(
    Department,
    Position,
    Employee,
    IngredientType,
    Ingredient,
    DishType,
    Provider,
    Promotion,
    Invoice,
    ImportInvoice,
);
