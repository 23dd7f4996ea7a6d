//! Share calculation for a new split.
//!
//! Equal splits truncate every invitee's share to [`SHARE_SCALE`] decimal places
//! and hand the remainder to the creator, so the shares always add up to the
//! exact total. Exact splits take each invitee's amount verbatim and give the
//! creator a zero share.

use super::money::{Amount, SHARE_SCALE, Share};
use super::split::SplitType;
use crate::error::{LedgerError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// One invited person on a create request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteeRequest {
    pub email: String,
    /// Required for `EXACT` splits, ignored for `EQUAL`.
    #[serde(default)]
    pub amount: Option<Decimal>,
}

impl InviteeRequest {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            amount: None,
        }
    }

    pub fn with_amount(email: impl Into<String>, amount: Decimal) -> Self {
        Self {
            email: email.into(),
            amount: Some(amount),
        }
    }
}

/// The computed shares: the creator's own and one per invitee, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareAllocation {
    pub creator: Share,
    pub invitees: Vec<(String, Share)>,
}

impl ShareAllocation {
    pub fn total(&self) -> Share {
        self.creator + self.invitees.iter().map(|(_, share)| *share).sum::<Share>()
    }
}

pub fn allocate(
    total: Amount,
    split_type: SplitType,
    invitees: &[InviteeRequest],
) -> Result<ShareAllocation> {
    match split_type {
        SplitType::Equal => {
            let (creator, each) = equal_shares(total, invitees.len() + 1)?;
            Ok(ShareAllocation {
                creator,
                invitees: invitees
                    .iter()
                    .map(|invitee| (invitee.email.clone(), each))
                    .collect(),
            })
        }
        SplitType::Exact => {
            let invitees = invitees
                .iter()
                .map(|invitee| {
                    let amount = invitee.amount.ok_or_else(|| {
                        LedgerError::invalid(format!(
                            "exact split requires an amount for {}",
                            invitee.email
                        ))
                    })?;
                    Ok((invitee.email.clone(), Share::new(amount)?))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ShareAllocation {
                creator: Share::ZERO,
                invitees,
            })
        }
    }
}

/// Splits `total` across `participants` people (creator included).
///
/// Returns `(creator_share, invitee_share)`.
pub fn equal_shares(total: Amount, participants: usize) -> Result<(Share, Share)> {
    if participants == 0 {
        return Err(LedgerError::invalid("a split needs at least one participant"));
    }
    let total = total.value();
    let each = (total / Decimal::from(participants))
        .round_dp_with_strategy(SHARE_SCALE, RoundingStrategy::ToZero);
    let creator = total - each * Decimal::from(participants - 1);
    Ok((Share::new(creator)?, Share::new(each)?))
}
