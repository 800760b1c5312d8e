//! Descriptors for every back-office resource and lookup list.
use crate::descriptor::{ReferenceKind, ResourceDescriptor, SortSpec};

pub const DEPARTMENTS: ReferenceKind = ReferenceKind {
    name: "departments",
    route: "department",
    list_key: Some("departments"),
    label_field: "departmentName",
    writable: DEPARTMENT_FIELDS,
};

pub const POSITIONS: ReferenceKind = ReferenceKind {
    name: "positions",
    route: "position",
    list_key: Some("positions"),
    label_field: "positionName",
    writable: POSITION_FIELDS,
};

pub const INGREDIENT_TYPES: ReferenceKind = ReferenceKind {
    name: "ingredientTypes",
    route: "ingredientType",
    list_key: Some("ingredientTypes"),
    label_field: "ingredientTypeName",
    writable: INGREDIENT_TYPE_FIELDS,
};

pub const DISHES: ReferenceKind = ReferenceKind {
    name: "dishes",
    route: "dish",
    list_key: Some("dishes"),
    label_field: "name",
    writable: &["name"],
};

pub const PROVIDERS: ReferenceKind = ReferenceKind {
    name: "providers",
    route: "provider",
    list_key: Some("providers"),
    label_field: "providerName",
    writable: PROVIDER_FIELDS,
};

pub const EMPLOYEES: ReferenceKind = ReferenceKind {
    name: "employees",
    route: "employee",
    list_key: Some("employees"),
    label_field: "name",
    writable: EMPLOYEE_FIELDS,
};

pub const INGREDIENTS: ReferenceKind = ReferenceKind {
    name: "ingredients",
    route: "ingredient",
    list_key: Some("ingredients"),
    label_field: "ingredientName",
    writable: INGREDIENT_FIELDS,
};

const DEPARTMENT_FIELDS: &[&str] = &["departmentName", "departmentDescription"];
const POSITION_FIELDS: &[&str] = &[
    "positionName",
    "positionDescription",
    "totalEmployee",
    "headOfPosition",
];
const EMPLOYEE_FIELDS: &[&str] = &[
    "name",
    "employeeAdress",
    "employeeGender",
    "employeeDateOfBirth",
    "departmentId",
    "positionId",
    "createAccount",
];
const INGREDIENT_TYPE_FIELDS: &[&str] = &["ingredientTypeName", "ingredientTypeDescription"];
const INGREDIENT_FIELDS: &[&str] = &["ingredientName", "ingredientTypeID"];
const PROVIDER_FIELDS: &[&str] = &[
    "providerName",
    "providerDescription",
    "providerPhoneNumber",
    "providerEmail",
    "providerAddress",
    "providerStatus",
];

pub const DEPARTMENT: ResourceDescriptor = ResourceDescriptor {
    name: "department",
    route: "department",
    list_key: Some("departments"),
    writable: DEPARTMENT_FIELDS,
    sorting: None,
    read_only: false,
    references: &[],
};

pub const POSITION: ResourceDescriptor = ResourceDescriptor {
    name: "position",
    route: "position",
    list_key: Some("positions"),
    writable: POSITION_FIELDS,
    sorting: Some(SortSpec {
        default_column: "positionName",
        columns: &[
            "positionName",
            "totalEmployee",
            "headOfPosition",
            "createAt",
            "updateAt",
        ],
    }),
    read_only: false,
    references: &[],
};

pub const EMPLOYEE: ResourceDescriptor = ResourceDescriptor {
    name: "employee",
    route: "employee",
    list_key: Some("employees"),
    writable: EMPLOYEE_FIELDS,
    sorting: None,
    read_only: false,
    references: &[DEPARTMENTS, POSITIONS],
};

pub const INGREDIENT_TYPE: ResourceDescriptor = ResourceDescriptor {
    name: "ingredientType",
    route: "ingredientType",
    list_key: Some("ingredientTypes"),
    writable: INGREDIENT_TYPE_FIELDS,
    sorting: None,
    read_only: false,
    references: &[],
};

pub const INGREDIENT: ResourceDescriptor = ResourceDescriptor {
    name: "ingredient",
    route: "ingredient",
    list_key: Some("ingredients"),
    writable: INGREDIENT_FIELDS,
    sorting: None,
    read_only: false,
    references: &[INGREDIENT_TYPES],
};

pub const DISH_TYPE: ResourceDescriptor = ResourceDescriptor {
    name: "dishType",
    route: "dishType",
    list_key: Some("dishTypes"),
    writable: &["DishTypeName", "DishTypeDescription", "DishTypeAvailable"],
    sorting: Some(SortSpec {
        default_column: "DishTypeName",
        columns: &["DishTypeName", "DishTypeAvailable", "createAt"],
    }),
    read_only: false,
    references: &[],
};

pub const PROVIDER: ResourceDescriptor = ResourceDescriptor {
    name: "provider",
    route: "provider",
    list_key: Some("providers"),
    writable: PROVIDER_FIELDS,
    sorting: Some(SortSpec {
        default_column: "providerName",
        columns: &[
            "providerName",
            "providerEmail",
            "providerStatus",
            "createAt",
            "updateAt",
        ],
    }),
    read_only: false,
    references: &[],
};

pub const PROMOTION: ResourceDescriptor = ResourceDescriptor {
    name: "promotion",
    route: "promotion",
    list_key: Some("promotions"),
    writable: &[
        "promotionName",
        "promotionDescription",
        "discount",
        "startDate",
        "endDate",
        "isAfterDish",
        "dishID",
    ],
    sorting: None,
    read_only: false,
    references: &[DISHES],
};

pub const INVOICE: ResourceDescriptor = ResourceDescriptor {
    name: "invoice",
    route: "invoice",
    list_key: Some("invoices"),
    writable: &[],
    sorting: None,
    read_only: true,
    references: &[],
};

pub const IMPORT_INVOICE: ResourceDescriptor = ResourceDescriptor {
    name: "importInvoice",
    route: "importinvoice",
    list_key: Some("importInvoices"),
    writable: &[
        "Provider",
        "Employee",
        "importDate",
        "totalExpense",
        "importInvoiceDetail",
    ],
    sorting: None,
    read_only: false,
    references: &[PROVIDERS, EMPLOYEES, INGREDIENTS],
};

pub const ALL: &[ResourceDescriptor] = &[
    DEPARTMENT,
    POSITION,
    EMPLOYEE,
    INGREDIENT_TYPE,
    INGREDIENT,
    DISH_TYPE,
    PROVIDER,
    PROMOTION,
    INVOICE,
    IMPORT_INVOICE,
];

/// Look a descriptor up by entity name or route segment, ignoring case.
pub fn descriptor(name: &str) -> Option<&'static ResourceDescriptor> {
    ALL.iter().find(|d| {
        d.name.eq_ignore_ascii_case(name) || d.route.eq_ignore_ascii_case(name)
    })
}
