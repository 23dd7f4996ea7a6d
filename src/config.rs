/// Settings the ledger needs from its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Payee identifier on the external payment rail.
    pub payee_id: String,
    /// ISO currency code attached to payment intents.
    pub currency: String,
}

impl LedgerConfig {
    pub const DEFAULT_PAYEE: &'static str = "merchant@paytm";
    pub const DEFAULT_CURRENCY: &'static str = "INR";

    pub fn new(payee_id: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            payee_id: payee_id.into(),
            currency: currency.into(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAYEE, Self::DEFAULT_CURRENCY)
    }
}
