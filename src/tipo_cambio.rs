use serde::Deserialize;
use serde::Serialize;

pub const COD_COMPRA: &str = "C";
pub const COD_VENTA: &str = "V";

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TipoCambio {
    /// `DD/MM/YYYY`, kept as the literal text upstream sends.
    #[serde(rename = "fecPublica")]
    pub fec_publica: String,
    #[serde(rename = "codTipo")]
    pub cod_tipo: String,
    #[serde(rename = "valTipo")]
    pub val_tipo: ValTipo,
}

/// Upstream sends the value either as a JSON number or as a numeric string.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(untagged)]
pub enum ValTipo {
    Number(serde_json::Number),
    Text(String),
}

impl ValTipo {
    pub fn as_text(&self) -> String {
        match self {
            ValTipo::Number(n) => n.to_string(),
            ValTipo::Text(s) => s.trim().to_string(),
        }
    }
}
