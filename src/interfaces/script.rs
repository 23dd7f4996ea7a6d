use super::csv::command_reader::{CommandReader, CommandRow, Operation, parse_participants};
use crate::application::ledger::{CreateSplitRequest, SplitLedger};
use crate::application::outcome::InviteeOutcome;
use crate::domain::ids::SplitId;
use crate::domain::split::SplitType;
use crate::domain::user::{User, normalize_email};
use crate::error::{LedgerError, Result};
use std::io::Read;
use tracing::{error, info, warn};

/// Replays a CSV script of commands against a ledger.
pub struct ScriptRunner<'a> {
    ledger: &'a SplitLedger,
}

/// Counts of what happened while running a script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptSummary {
    pub applied: usize,
    pub rejected: usize,
    pub malformed: usize,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(ledger: &'a SplitLedger) -> Self {
        Self { ledger }
    }

    /// Applies every command in order. Bad rows and failing commands are
    /// logged and skipped.
    pub async fn run<R: Read>(&self, reader: CommandReader<R>) -> ScriptSummary {
        let mut summary = ScriptSummary::default();
        for (line, row) in reader.commands().enumerate() {
            match row {
                Ok(command) => {
                    let op = command.op;
                    match self.apply(command).await {
                        Ok(()) => summary.applied += 1,
                        Err(e) => {
                            error!(line = line + 1, ?op, error = %e, "Error applying command");
                            summary.rejected += 1;
                        }
                    }
                }
                Err(e) => {
                    error!(line = line + 1, error = %e, "Error reading command");
                    summary.malformed += 1;
                }
            }
        }
        info!(
            applied = summary.applied,
            rejected = summary.rejected,
            malformed = summary.malformed,
            "Script finished"
        );
        summary
    }

    pub async fn apply(&self, command: CommandRow) -> Result<()> {
        match command.op {
            Operation::Register => self.register(command).await,
            Operation::Create => self.create(command).await,
            Operation::MarkPaid => self.mark_paid(command).await,
            Operation::Pay => self.pay(command).await,
            Operation::Invite => self.invite(command).await,
            Operation::Reconcile => self.reconcile(command).await,
            Operation::Delete => self.delete(command).await,
        }
    }

    async fn register(&self, command: CommandRow) -> Result<()> {
        let name = command.name.unwrap_or_default();
        let (user, outcome) = self.ledger.register_user(&name, &command.actor).await?;
        if let Some(err) = outcome.partial_failure() {
            warn!(user_id = %user.id, error = %err, "Some pending splits were not converted");
        }
        Ok(())
    }

    async fn create(&self, command: CommandRow) -> Result<()> {
        let actor = self.actor(&command.actor).await?;
        let title = required(command.split.as_deref(), "split")?;
        let total_amount = command
            .amount
            .ok_or_else(|| LedgerError::invalid("missing amount"))?;
        let split_type = match command.split_type.as_deref() {
            Some(raw) => raw.parse()?,
            None => SplitType::Equal,
        };
        let participants = parse_participants(command.participants.as_deref().unwrap_or_default())?;

        let created = self
            .ledger
            .create_split(
                &actor,
                CreateSplitRequest {
                    title,
                    total_amount,
                    split_type,
                    participants,
                },
            )
            .await?;
        for invitee in &created.invitees {
            if let InviteeOutcome::Failed { email, reason } = invitee {
                warn!(split_id = %created.split_id, %email, %reason, "Invitee was not added");
            }
        }
        Ok(())
    }

    async fn mark_paid(&self, command: CommandRow) -> Result<()> {
        let actor = self.actor(&command.actor).await?;
        let split_id = self.split_by_title(&actor, command.split.as_deref()).await?;
        let target = normalize_email(&required(command.target.as_deref(), "target")?)?;
        let detail = self.ledger.get_detail(split_id, &actor).await?;
        let participant_id = detail
            .participant_by_email(&target)
            .ok_or_else(|| LedgerError::not_found(format!("participant {target}")))?
            .participant_id()
            .ok_or_else(|| LedgerError::invalid(format!("{target} has not registered yet")))?;
        self.ledger.mark_paid(split_id, participant_id, &actor).await?;
        Ok(())
    }

    async fn pay(&self, command: CommandRow) -> Result<()> {
        let actor = self.actor(&command.actor).await?;
        let split_id = self.split_by_title(&actor, command.split.as_deref()).await?;
        let intent = self.ledger.initiate_payment(split_id, &actor).await?;
        info!(%split_id, user_id = %actor.id, amount = %intent.amount, uri = %intent.uri, "Payment initiated");
        Ok(())
    }

    async fn invite(&self, command: CommandRow) -> Result<()> {
        let actor = self.actor(&command.actor).await?;
        let split_id = self.split_by_title(&actor, command.split.as_deref()).await?;
        let target = required(command.target.as_deref(), "target")?;
        self.ledger.send_invitation(split_id, &target, &actor).await?;
        Ok(())
    }

    async fn reconcile(&self, command: CommandRow) -> Result<()> {
        let actor = self.actor(&command.actor).await?;
        let outcome = self.ledger.reconcile_pending_for_user(&actor).await?;
        match outcome.partial_failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn delete(&self, command: CommandRow) -> Result<()> {
        let actor = self.actor(&command.actor).await?;
        let split_id = self.split_by_title(&actor, command.split.as_deref()).await?;
        self.ledger.delete_split(split_id, &actor).await
    }

    async fn actor(&self, email: &str) -> Result<User> {
        self.ledger
            .find_user(email)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("user {email}")))
    }

    /// Most recent split with this title among those the actor can list.
    async fn split_by_title(&self, actor: &User, title: Option<&str>) -> Result<SplitId> {
        let title = required(title, "split")?;
        self.ledger
            .list_for_user(actor)
            .await?
            .into_iter()
            .find(|summary| summary.title == title)
            .map(|summary| summary.id)
            .ok_or_else(|| LedgerError::not_found(format!("split '{title}'")))
    }
}

fn required(value: Option<&str>, column: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| LedgerError::invalid(format!("missing {column}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::split::SplitStatus;
    use crate::infrastructure::in_memory::{InMemoryNotifier, InMemorySplitStore, InMemoryUserDirectory};

    fn ledger() -> SplitLedger {
        SplitLedger::new(
            Box::new(InMemorySplitStore::new()),
            Box::new(InMemoryUserDirectory::new()),
            Box::new(InMemoryNotifier::new()),
        )
    }

    const SCRIPT: &str = "op,actor,split,name,amount,split_type,participants,target
register,alice@x.com,,Alice
register,bob@x.com,,Bob
create,alice@x.com,Dinner,,300,equal,bob@x.com;carol@x.com
mark_paid,alice@x.com,Dinner,,,,,bob@x.com
mark_paid,bob@x.com,Dinner,,,,,bob@x.com
bogus,alice@x.com
register,carol@x.com,,Carol
mark_paid,alice@x.com,Dinner,,,,,carol@x.com
";

    #[tokio::test]
    async fn test_run_script_end_to_end() {
        let ledger = ledger();
        let summary = ScriptRunner::new(&ledger)
            .run(CommandReader::new(SCRIPT.as_bytes()))
            .await;

        assert_eq!(summary.applied, 6);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.malformed, 1);

        let splits = ledger.all_splits().await.unwrap();
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].effective_status(), SplitStatus::Completed);
        assert_eq!(splits[0].participants().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_actor_is_rejected() {
        let ledger = ledger();
        let script = "op,actor,split\ndelete,ghost@x.com,Dinner\n";
        let summary = ScriptRunner::new(&ledger)
            .run(CommandReader::new(script.as_bytes()))
            .await;
        assert_eq!(summary.rejected, 1);
    }

    #[tokio::test]
    async fn test_pending_invitee_cannot_be_marked_paid() {
        let ledger = ledger();
        let script = "op,actor,split,name,amount,split_type,participants,target
register,alice@x.com,,Alice
create,alice@x.com,Cab,,90,exact,dave@x.com=45
mark_paid,alice@x.com,Cab,,,,,dave@x.com
";
        let summary = ScriptRunner::new(&ledger)
            .run(CommandReader::new(script.as_bytes()))
            .await;
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.rejected, 1);
    }

    #[tokio::test]
    async fn test_apply_dispatches_each_operation() {
        let ledger = ledger();
        let runner = ScriptRunner::new(&ledger);
        let script = "op,actor,split,name,amount,split_type,participants,target
register,alice@x.com,,Alice
create,alice@x.com,Cab,,90,equal,bob@x.com
invite,alice@x.com,Cab,,,,,bob@x.com
register,bob@x.com,,Bob
reconcile,bob@x.com
pay,bob@x.com,Cab
delete,alice@x.com,Cab
";
        for row in CommandReader::new(script.as_bytes()).commands() {
            runner.apply(row.unwrap()).await.unwrap();
        }

        assert!(ledger.find_user("bob@x.com").await.unwrap().is_some());
        assert!(ledger.all_splits().await.unwrap().is_empty());
    }
}
