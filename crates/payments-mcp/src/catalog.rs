// crates/payments-mcp/src/catalog.rs
// ============================================================================
// Module: Payment Tool Catalogue
// Description: Default payment toolsets expressed as REST bindings.
// Purpose: Populate a toolset group with the built-in payment tools.
// Dependencies: async-trait, serde_json
// ============================================================================

//! ## Overview
//! Every built-in tool is a [`RestBinding`]: a name, its parameters, an HTTP
//! method, and a path template whose `{placeholders}` are filled from call
//! arguments. [`RestTool`] validates arguments against the binding, builds an
//! [`ApiRequest`], and sends it with the call's client.
//!
//! Placeholder arguments become path segments. Remaining arguments become
//! query pairs for `GET` and the JSON body otherwise.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

use crate::api::ApiRequest;
use crate::api::HttpMethod;
use crate::tools::ParameterKind;
use crate::tools::Tool;
use crate::tools::ToolContext;
use crate::tools::ToolError;
use crate::tools::ToolHandler;
use crate::tools::ToolParameter;
use crate::toolsets::ToolsetGroup;

// ============================================================================
// SECTION: Binding Types
// ============================================================================

/// Whether a binding mutates provider state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Non-mutating.
    Read,
    /// Mutating.
    Write,
}

/// Declared parameter of a binding.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    /// Argument name.
    pub name: &'static str,
    /// Accepted JSON type.
    pub kind: ParameterKind,
    /// Whether the argument is mandatory.
    pub required: bool,
    /// Description shown to clients.
    pub description: &'static str,
}

/// Declarative REST binding for one tool.
#[derive(Debug, Clone, Copy)]
pub struct RestBinding {
    /// Tool name.
    pub name: &'static str,
    /// Tool description.
    pub description: &'static str,
    /// Read or write classification.
    pub access: Access,
    /// HTTP method.
    pub method: HttpMethod,
    /// Path template relative to the API base, e.g. `payments/{payment_id}`.
    pub path: &'static str,
    /// Declared parameters.
    pub params: &'static [ParamSpec],
}

/// Named group of bindings.
#[derive(Debug, Clone, Copy)]
pub struct ToolsetSpec {
    /// Toolset name.
    pub name: &'static str,
    /// Toolset description.
    pub description: &'static str,
    /// Bindings in the toolset.
    pub tools: &'static [RestBinding],
}

/// Required parameter declaration.
const fn req(name: &'static str, kind: ParameterKind, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: true,
        description,
    }
}

/// Optional parameter declaration.
const fn opt(name: &'static str, kind: ParameterKind, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: false,
        description,
    }
}

/// Shorthand for [`ParameterKind::String`].
const STR: ParameterKind = ParameterKind::String;
/// Shorthand for [`ParameterKind::Integer`].
const INT: ParameterKind = ParameterKind::Integer;
/// Shorthand for [`ParameterKind::Boolean`].
const BOOL: ParameterKind = ParameterKind::Boolean;
/// Shorthand for [`ParameterKind::Object`].
const OBJ: ParameterKind = ParameterKind::Object;

/// Pagination parameters shared by list endpoints.
const LIST_PARAMS: &[ParamSpec] = &[
    opt("count", INT, "Number of records to fetch (1-100)"),
    opt("skip", INT, "Number of records to skip"),
    opt("from", INT, "Unix timestamp lower bound"),
    opt("to", INT, "Unix timestamp upper bound"),
];

// ============================================================================
// SECTION: Default Catalogue
// ============================================================================

/// Built-in payment toolsets.
pub const DEFAULT_TOOLSETS: &[ToolsetSpec] = &[
    ToolsetSpec {
        name: "payments",
        description: "Payment lookup, capture, and updates",
        tools: &[
            RestBinding {
                name: "fetch_payment",
                description: "Fetch a payment by id",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "payments/{payment_id}",
                params: &[req("payment_id", STR, "Payment id, starts with pay_")],
            },
            RestBinding {
                name: "fetch_all_payments",
                description: "List payments",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "payments",
                params: LIST_PARAMS,
            },
            RestBinding {
                name: "fetch_payment_card_details",
                description: "Fetch card details used for a payment",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "payments/{payment_id}/card",
                params: &[req("payment_id", STR, "Payment id, starts with pay_")],
            },
            RestBinding {
                name: "capture_payment",
                description: "Capture an authorized payment",
                access: Access::Write,
                method: HttpMethod::Post,
                path: "payments/{payment_id}/capture",
                params: &[
                    req("payment_id", STR, "Payment id, starts with pay_"),
                    req("amount", INT, "Amount in the smallest currency unit"),
                    req("currency", STR, "ISO currency code"),
                ],
            },
            RestBinding {
                name: "update_payment",
                description: "Update payment notes",
                access: Access::Write,
                method: HttpMethod::Patch,
                path: "payments/{payment_id}",
                params: &[
                    req("payment_id", STR, "Payment id, starts with pay_"),
                    req("notes", OBJ, "Key-value notes"),
                ],
            },
        ],
    },
    ToolsetSpec {
        name: "payment_links",
        description: "Payment link creation and management",
        tools: &[
            RestBinding {
                name: "fetch_payment_link",
                description: "Fetch a payment link by id",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "payment_links/{payment_link_id}",
                params: &[req("payment_link_id", STR, "Payment link id, starts with plink_")],
            },
            RestBinding {
                name: "fetch_all_payment_links",
                description: "List payment links",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "payment_links",
                params: &[
                    opt("payment_id", STR, "Filter by payment id"),
                    opt("reference_id", STR, "Filter by reference id"),
                ],
            },
            RestBinding {
                name: "create_payment_link",
                description: "Create a payment link",
                access: Access::Write,
                method: HttpMethod::Post,
                path: "payment_links",
                params: &[
                    req("amount", INT, "Amount in the smallest currency unit"),
                    req("currency", STR, "ISO currency code"),
                    opt("description", STR, "Purpose of the payment"),
                    opt("reference_id", STR, "Merchant reference"),
                    opt("customer", OBJ, "Customer name, email, and contact"),
                    opt("notify", OBJ, "Notification channels"),
                    opt("expire_by", INT, "Unix timestamp after which the link expires"),
                    opt("notes", OBJ, "Key-value notes"),
                ],
            },
            RestBinding {
                name: "update_payment_link",
                description: "Update a payment link",
                access: Access::Write,
                method: HttpMethod::Patch,
                path: "payment_links/{payment_link_id}",
                params: &[
                    req("payment_link_id", STR, "Payment link id, starts with plink_"),
                    opt("reference_id", STR, "Merchant reference"),
                    opt("expire_by", INT, "Unix timestamp after which the link expires"),
                    opt("reminder_enable", BOOL, "Send payment reminders"),
                    opt("notes", OBJ, "Key-value notes"),
                ],
            },
            RestBinding {
                name: "send_payment_link",
                description: "Resend a payment link over sms or email",
                access: Access::Write,
                method: HttpMethod::Post,
                path: "payment_links/{payment_link_id}/notify_by/{medium}",
                params: &[
                    req("payment_link_id", STR, "Payment link id, starts with plink_"),
                    req("medium", STR, "sms or email"),
                ],
            },
        ],
    },
    ToolsetSpec {
        name: "orders",
        description: "Order creation and lookup",
        tools: &[
            RestBinding {
                name: "fetch_order",
                description: "Fetch an order by id",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "orders/{order_id}",
                params: &[req("order_id", STR, "Order id, starts with order_")],
            },
            RestBinding {
                name: "fetch_all_orders",
                description: "List orders",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "orders",
                params: &[
                    opt("count", INT, "Number of records to fetch (1-100)"),
                    opt("skip", INT, "Number of records to skip"),
                    opt("from", INT, "Unix timestamp lower bound"),
                    opt("to", INT, "Unix timestamp upper bound"),
                    opt("authorized", INT, "1 to list only orders with authorized payments"),
                    opt("receipt", STR, "Filter by receipt"),
                ],
            },
            RestBinding {
                name: "fetch_order_payments",
                description: "List payments made against an order",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "orders/{order_id}/payments",
                params: &[req("order_id", STR, "Order id, starts with order_")],
            },
            RestBinding {
                name: "create_order",
                description: "Create an order",
                access: Access::Write,
                method: HttpMethod::Post,
                path: "orders",
                params: &[
                    req("amount", INT, "Amount in the smallest currency unit"),
                    req("currency", STR, "ISO currency code"),
                    opt("receipt", STR, "Merchant receipt"),
                    opt("partial_payment", BOOL, "Allow partial payments"),
                    opt("notes", OBJ, "Key-value notes"),
                ],
            },
            RestBinding {
                name: "update_order",
                description: "Update order notes",
                access: Access::Write,
                method: HttpMethod::Patch,
                path: "orders/{order_id}",
                params: &[
                    req("order_id", STR, "Order id, starts with order_"),
                    req("notes", OBJ, "Key-value notes"),
                ],
            },
        ],
    },
    ToolsetSpec {
        name: "refunds",
        description: "Refund creation and lookup",
        tools: &[
            RestBinding {
                name: "fetch_refund",
                description: "Fetch a refund by id",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "refunds/{refund_id}",
                params: &[req("refund_id", STR, "Refund id, starts with rfnd_")],
            },
            RestBinding {
                name: "fetch_all_refunds",
                description: "List refunds",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "refunds",
                params: LIST_PARAMS,
            },
            RestBinding {
                name: "fetch_payment_refunds",
                description: "List refunds issued for a payment",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "payments/{payment_id}/refunds",
                params: &[req("payment_id", STR, "Payment id, starts with pay_")],
            },
            RestBinding {
                name: "create_refund",
                description: "Refund a captured payment",
                access: Access::Write,
                method: HttpMethod::Post,
                path: "payments/{payment_id}/refund",
                params: &[
                    req("payment_id", STR, "Payment id, starts with pay_"),
                    opt("amount", INT, "Partial refund amount; omit for a full refund"),
                    opt("speed", STR, "normal or optimum"),
                    opt("receipt", STR, "Merchant receipt"),
                    opt("notes", OBJ, "Key-value notes"),
                ],
            },
            RestBinding {
                name: "update_refund",
                description: "Update refund notes",
                access: Access::Write,
                method: HttpMethod::Patch,
                path: "refunds/{refund_id}",
                params: &[
                    req("refund_id", STR, "Refund id, starts with rfnd_"),
                    req("notes", OBJ, "Key-value notes"),
                ],
            },
        ],
    },
    ToolsetSpec {
        name: "payouts",
        description: "Payout lookup",
        tools: &[
            RestBinding {
                name: "fetch_payout",
                description: "Fetch a payout by id",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "payouts/{payout_id}",
                params: &[req("payout_id", STR, "Payout id, starts with pout_")],
            },
            RestBinding {
                name: "fetch_all_payouts",
                description: "List payouts for an account",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "payouts",
                params: &[
                    req("account_number", STR, "Business account number"),
                    opt("count", INT, "Number of records to fetch (1-100)"),
                    opt("skip", INT, "Number of records to skip"),
                ],
            },
        ],
    },
    ToolsetSpec {
        name: "qr_codes",
        description: "UPI QR code management",
        tools: &[
            RestBinding {
                name: "fetch_qr_code",
                description: "Fetch a QR code by id",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "payments/qr_codes/{qr_code_id}",
                params: &[req("qr_code_id", STR, "QR code id, starts with qr_")],
            },
            RestBinding {
                name: "fetch_all_qr_codes",
                description: "List QR codes",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "payments/qr_codes",
                params: &[
                    opt("customer_id", STR, "Filter by customer id"),
                    opt("payment_id", STR, "Filter by payment id"),
                    opt("count", INT, "Number of records to fetch (1-100)"),
                    opt("skip", INT, "Number of records to skip"),
                ],
            },
            RestBinding {
                name: "fetch_qr_code_payments",
                description: "List payments received on a QR code",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "payments/qr_codes/{qr_code_id}/payments",
                params: &[req("qr_code_id", STR, "QR code id, starts with qr_")],
            },
            RestBinding {
                name: "create_qr_code",
                description: "Create a UPI QR code",
                access: Access::Write,
                method: HttpMethod::Post,
                path: "payments/qr_codes",
                params: &[
                    req("type", STR, "upi_qr"),
                    req("usage", STR, "single_use or multiple_use"),
                    req("fixed_amount", BOOL, "Whether the QR code accepts a fixed amount"),
                    opt("payment_amount", INT, "Amount when fixed_amount is true"),
                    opt("name", STR, "Label for the QR code"),
                    opt("description", STR, "Purpose of the QR code"),
                    opt("customer_id", STR, "Customer id"),
                    opt("close_by", INT, "Unix timestamp when the QR code closes"),
                    opt("notes", OBJ, "Key-value notes"),
                ],
            },
            RestBinding {
                name: "close_qr_code",
                description: "Close a QR code",
                access: Access::Write,
                method: HttpMethod::Post,
                path: "payments/qr_codes/{qr_code_id}/close",
                params: &[req("qr_code_id", STR, "QR code id, starts with qr_")],
            },
        ],
    },
    ToolsetSpec {
        name: "settlements",
        description: "Settlement lookup and reconciliation",
        tools: &[
            RestBinding {
                name: "fetch_settlement",
                description: "Fetch a settlement by id",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "settlements/{settlement_id}",
                params: &[req("settlement_id", STR, "Settlement id, starts with setl_")],
            },
            RestBinding {
                name: "fetch_all_settlements",
                description: "List settlements",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "settlements",
                params: LIST_PARAMS,
            },
            RestBinding {
                name: "fetch_settlement_recon_details",
                description: "Fetch settlement reconciliation for a period",
                access: Access::Read,
                method: HttpMethod::Get,
                path: "settlements/recon/combined",
                params: &[
                    req("year", INT, "Four-digit year"),
                    req("month", INT, "Month (1-12)"),
                    opt("day", INT, "Day of month"),
                    opt("count", INT, "Number of records to fetch (1-1000)"),
                    opt("skip", INT, "Number of records to skip"),
                ],
            },
        ],
    },
];

// ============================================================================
// SECTION: Group Construction
// ============================================================================

/// Builds a toolset group holding every built-in toolset.
///
/// Nothing is enabled yet; callers apply their admission list afterwards.
#[must_use]
pub fn default_toolset_group(read_only: bool) -> ToolsetGroup {
    let mut group = ToolsetGroup::new(read_only);
    for spec in DEFAULT_TOOLSETS {
        let reads = spec.tools.iter().filter(|binding| binding.access == Access::Read);
        let writes = spec.tools.iter().filter(|binding| binding.access == Access::Write);
        let toolset = group
            .new_toolset(spec.name, spec.description)
            .add_read_tools(reads.map(RestBinding::tool))
            .add_write_tools(writes.map(RestBinding::tool));
        group.add_toolset(toolset);
    }
    group
}

impl RestBinding {
    /// Builds the MCP tool for this binding.
    #[must_use]
    pub fn tool(&self) -> Tool {
        let parameters = self
            .params
            .iter()
            .map(|param| {
                if param.required {
                    ToolParameter::required(param.name, param.kind, param.description)
                } else {
                    ToolParameter::optional(param.name, param.kind, param.description)
                }
            })
            .collect();
        Tool::new(self.name, self.description, parameters, Arc::new(RestTool::new(*self)))
    }

    /// Builds the downstream request for validated `arguments`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidParams`] when arguments do not match the
    /// declared parameters.
    pub fn request(&self, arguments: Value) -> Result<ApiRequest, ToolError> {
        let mut args = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ToolError::InvalidParams("arguments must be an object".to_string())),
        };
        args.retain(|_, value| !value.is_null());
        self.validate(&args)?;
        let mut path = Vec::new();
        for segment in self.path.split('/').filter(|segment| !segment.is_empty()) {
            let placeholder = segment.strip_prefix('{').and_then(|rest| rest.strip_suffix('}'));
            match placeholder {
                Some(name) => {
                    let value =
                        args.remove(name).map(|value| scalar_text(&value)).unwrap_or_default();
                    if value.trim().is_empty() {
                        return Err(ToolError::InvalidParams(format!(
                            "parameter {name} must be non-empty"
                        )));
                    }
                    path.push(value);
                }
                None => path.push(segment.to_string()),
            }
        }
        let (query, body) = match self.method {
            HttpMethod::Get => {
                let query =
                    args.iter().map(|(key, value)| (key.clone(), scalar_text(value))).collect();
                (query, None)
            }
            HttpMethod::Post | HttpMethod::Patch => (Vec::new(), Some(Value::Object(args))),
        };
        Ok(ApiRequest {
            method: self.method,
            path,
            query,
            body,
        })
    }

    /// Checks arguments against declared parameters.
    fn validate(&self, args: &Map<String, Value>) -> Result<(), ToolError> {
        let declared = |key: &&String| self.params.iter().any(|param| param.name == key.as_str());
        if let Some(unknown) = args.keys().find(|key| !declared(key)) {
            return Err(ToolError::InvalidParams(format!("unknown parameter: {unknown}")));
        }
        for param in self.params {
            match args.get(param.name) {
                None if param.required => {
                    return Err(ToolError::InvalidParams(format!(
                        "missing required parameter: {}",
                        param.name
                    )));
                }
                Some(value) if !param.kind.matches(value) => {
                    return Err(ToolError::InvalidParams(format!(
                        "parameter {} must be {}",
                        param.name,
                        param.kind.as_str()
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Tool handler executing a [`RestBinding`].
pub struct RestTool {
    /// Binding executed by this handler.
    binding: RestBinding,
}

impl RestTool {
    /// Builds a handler for `binding`.
    #[must_use]
    pub const fn new(binding: RestBinding) -> Self {
        Self {
            binding,
        }
    }
}

#[async_trait]
impl ToolHandler for RestTool {
    async fn call(&self, context: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        let request = self.binding.request(arguments)?;
        tracing::debug!(
            tool = self.binding.name,
            method = request.method.as_str(),
            path = %request.path.join("/"),
            "calling payment api"
        );
        Ok(context.client().send(request).await?)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders a scalar argument as text for paths and query strings.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
