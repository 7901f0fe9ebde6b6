//! Household invitation state machine.
//!
//! # Responsibility
//! - Persist invitations and move them from `pending` to one terminal status.
//! - Create the invitee's membership in the same session as acceptance.
//!
//! # Invariants
//! - Every status write is guarded by `status = 'pending'`, so at most one
//!   terminal transition ever lands.
//! - No membership row exists for an invitation that was not accepted in the
//!   same session.
//! - E-mail addresses are stored and matched lower-cased.
//! - Tokens, e-mail addresses and notes are never logged.

use crate::clock::truncate_to_seconds;
use crate::db::{run_in_session, QueryContext, QueryExecutor, Session, TransactionalSession};
use crate::error::{require_id, ResultExt, StoreError, StoreResult};
use crate::model::{
    normalize_email, HouseholdInvitation, HouseholdInvitationCreationInput,
    HouseholdInvitationStatus, HouseholdMembershipCreationInput, HouseholdRole,
    HouseholdUserMembership, InvitationAcceptanceForUserInput, ListPage, QueryFilter,
};
use crate::repo::ensure_connection_ready;
use crate::repo::household_repo::add_user_to_household;
use crate::repo::list::{list_page, ListSpec};
use crate::repo::mapping::{get_enum, get_opt_time, get_time, time_to_db};
use crate::runtime::StoreRuntime;
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Params, Row};

const INVITATION_COLUMNS: &str = "household_invitations.id,
    household_invitations.destination_household,
    household_invitations.from_user,
    household_invitations.to_user,
    household_invitations.to_name,
    household_invitations.to_email,
    household_invitations.token,
    household_invitations.note,
    household_invitations.status_note,
    household_invitations.status,
    household_invitations.expires_at,
    household_invitations.created_at,
    household_invitations.last_updated_at,
    household_invitations.archived_at";

pub trait HouseholdInvitationRepository {
    fn household_invitation_exists(
        &self,
        ctx: &QueryContext,
        invitation_id: &str,
    ) -> StoreResult<bool>;
    fn get_household_invitation_by_household_and_id(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        invitation_id: &str,
    ) -> StoreResult<HouseholdInvitation>;
    fn get_household_invitation_by_token_and_id(
        &self,
        ctx: &QueryContext,
        token: &str,
        invitation_id: &str,
    ) -> StoreResult<HouseholdInvitation>;
    fn get_household_invitation_by_email_and_token(
        &self,
        ctx: &QueryContext,
        email_address: &str,
        token: &str,
    ) -> StoreResult<HouseholdInvitation>;
    fn list_pending_invitations_from_user(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<HouseholdInvitation>>;
    /// Pending invitations addressed to the user by id or by e-mail address.
    fn list_pending_invitations_for_user(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        email_address: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<HouseholdInvitation>>;
    fn create_household_invitation(
        &self,
        ctx: &QueryContext,
        input: &HouseholdInvitationCreationInput,
    ) -> StoreResult<HouseholdInvitation>;
    fn cancel_household_invitation(
        &self,
        ctx: &QueryContext,
        invitation_id: &str,
        note: &str,
    ) -> StoreResult<()>;
    fn reject_household_invitation(
        &self,
        ctx: &QueryContext,
        invitation_id: &str,
        note: &str,
    ) -> StoreResult<()>;
    /// Accepts a pending invitation and, when the invitee is a known user,
    /// adds them to the destination household.
    fn accept_household_invitation(
        &self,
        ctx: &QueryContext,
        invitation_id: &str,
        token: &str,
        note: &str,
    ) -> StoreResult<Option<HouseholdUserMembership>>;
    /// Associates pending invitations sent to `email_address` with a user
    /// that now exists. Matching nothing is not an error.
    fn attach_invitations_to_user(
        &self,
        ctx: &QueryContext,
        email_address: &str,
        user_id: &str,
    ) -> StoreResult<usize>;
    /// Registration-time acceptance inside a session the caller owns.
    ///
    /// On failure the session is rolled back before the error is returned.
    fn accept_invitation_for_user<'s>(
        &self,
        ctx: &QueryContext,
        session: Session<'s>,
        input: &InvitationAcceptanceForUserInput,
    ) -> StoreResult<Session<'s>>;
}

pub struct SqliteHouseholdInvitationRepository<'conn> {
    conn: &'conn Connection,
    runtime: StoreRuntime,
}

impl<'conn> SqliteHouseholdInvitationRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, runtime: StoreRuntime) -> StoreResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                (
                    "household_invitations",
                    &["destination_household", "to_email", "token", "status", "expires_at"],
                ),
                ("household_user_memberships", &["household_role", "reason"]),
            ],
        )?;
        Ok(Self { conn, runtime })
    }

    fn settle(
        &self,
        ctx: &QueryContext,
        invitation_id: &str,
        next: HouseholdInvitationStatus,
        note: &str,
    ) -> StoreResult<()> {
        require_id(invitation_id, "household invitation id")?;
        let changed = set_invitation_status(
            self.conn,
            ctx,
            self.runtime.now(),
            invitation_id,
            next,
            note,
        )?;
        if changed == 1 {
            info!(
                "event=household_invitation_status module=repo status=ok id={invitation_id} new_status={next}"
            );
            return Ok(());
        }

        let current = fetch_invitation(
            self.conn,
            ctx,
            "household_invitations.id = ?1",
            [invitation_id],
        )?;
        if current.status == next {
            return Ok(());
        }
        Err(StoreError::conflict(format!(
            "household invitation {invitation_id} is already {}",
            current.status
        )))
    }
}

impl HouseholdInvitationRepository for SqliteHouseholdInvitationRepository<'_> {
    fn household_invitation_exists(
        &self,
        ctx: &QueryContext,
        invitation_id: &str,
    ) -> StoreResult<bool> {
        require_id(invitation_id, "household invitation id")?;
        self.conn
            .read_exists(
                ctx,
                "household invitation existence",
                "SELECT EXISTS (
                    SELECT 1 FROM household_invitations WHERE id = ?1 AND archived_at IS NULL
                );",
                [invitation_id],
            )
            .annotate("check household invitation existence", invitation_id)
    }

    fn get_household_invitation_by_household_and_id(
        &self,
        ctx: &QueryContext,
        household_id: &str,
        invitation_id: &str,
    ) -> StoreResult<HouseholdInvitation> {
        require_id(household_id, "household id")?;
        require_id(invitation_id, "household invitation id")?;
        fetch_invitation(
            self.conn,
            ctx,
            "household_invitations.destination_household = ?1 AND household_invitations.id = ?2",
            params![household_id, invitation_id],
        )
        .annotate("get household invitation by household and id", invitation_id)
    }

    fn get_household_invitation_by_token_and_id(
        &self,
        ctx: &QueryContext,
        token: &str,
        invitation_id: &str,
    ) -> StoreResult<HouseholdInvitation> {
        require_id(token, "invitation token")?;
        require_id(invitation_id, "household invitation id")?;
        fetch_invitation(
            self.conn,
            ctx,
            "household_invitations.token = ?1 AND household_invitations.id = ?2",
            params![token, invitation_id],
        )
        .annotate("get household invitation by token and id", invitation_id)
    }

    fn get_household_invitation_by_email_and_token(
        &self,
        ctx: &QueryContext,
        email_address: &str,
        token: &str,
    ) -> StoreResult<HouseholdInvitation> {
        require_id(email_address, "e-mail address")?;
        require_id(token, "invitation token")?;
        fetch_invitation(
            self.conn,
            ctx,
            "household_invitations.to_email = ?1 AND household_invitations.token = ?2",
            params![normalize_email(email_address), token],
        )
        .annotate("get household invitation by email and token", "<redacted>")
    }

    fn list_pending_invitations_from_user(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<HouseholdInvitation>> {
        require_id(user_id, "user id")?;
        let spec = ListSpec::new(
            "household_invitations",
            INVITATION_COLUMNS,
            "household_invitations",
        )
        .scoped(
            "household_invitations.from_user = ? AND household_invitations.status = 'pending'",
            vec![Value::Text(user_id.to_string())],
        );
        list_page(self.conn, ctx, "household invitation", &spec, filter, invitation_from_row)
            .annotate("list pending invitations from user", user_id)
    }

    fn list_pending_invitations_for_user(
        &self,
        ctx: &QueryContext,
        user_id: &str,
        email_address: &str,
        filter: &QueryFilter,
    ) -> StoreResult<ListPage<HouseholdInvitation>> {
        require_id(user_id, "user id")?;
        let spec = ListSpec::new(
            "household_invitations",
            INVITATION_COLUMNS,
            "household_invitations",
        )
        .scoped(
            "(household_invitations.to_user = ? OR household_invitations.to_email = ?)
             AND household_invitations.status = 'pending'",
            vec![
                Value::Text(user_id.to_string()),
                Value::Text(normalize_email(email_address)),
            ],
        );
        list_page(self.conn, ctx, "household invitation", &spec, filter, invitation_from_row)
            .annotate("list pending invitations for user", user_id)
    }

    fn create_household_invitation(
        &self,
        ctx: &QueryContext,
        input: &HouseholdInvitationCreationInput,
    ) -> StoreResult<HouseholdInvitation> {
        input.validate()?;
        let now = self.runtime.now();
        let invitation = HouseholdInvitation {
            id: input.id.clone(),
            destination_household: input.destination_household.clone(),
            from_user: input.from_user.clone(),
            to_user: input.to_user.clone(),
            to_name: input.to_name.clone(),
            to_email: normalize_email(&input.to_email),
            token: input.token.clone(),
            note: input.note.clone(),
            status_note: String::new(),
            status: HouseholdInvitationStatus::Pending,
            expires_at: truncate_to_seconds(input.expires_at),
            created_at: now,
            last_updated_at: None,
            archived_at: None,
        };

        self.conn
            .execute_write(
                ctx,
                "household invitation creation",
                "INSERT INTO household_invitations (
                    id,
                    destination_household,
                    from_user,
                    to_user,
                    to_name,
                    to_email,
                    token,
                    note,
                    status,
                    expires_at,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
                params![
                    invitation.id,
                    invitation.destination_household,
                    invitation.from_user,
                    invitation.to_user,
                    invitation.to_name,
                    invitation.to_email,
                    invitation.token,
                    invitation.note,
                    invitation.status.as_str(),
                    time_to_db(invitation.expires_at),
                    time_to_db(now),
                ],
            )
            .annotate("create household invitation", &input.id)?;

        info!(
            "event=household_invitation_create module=repo status=ok id={} household_id={}",
            invitation.id, invitation.destination_household
        );
        Ok(invitation)
    }

    fn cancel_household_invitation(
        &self,
        ctx: &QueryContext,
        invitation_id: &str,
        note: &str,
    ) -> StoreResult<()> {
        self.settle(ctx, invitation_id, HouseholdInvitationStatus::Cancelled, note)
            .annotate("cancel household invitation", invitation_id)
    }

    fn reject_household_invitation(
        &self,
        ctx: &QueryContext,
        invitation_id: &str,
        note: &str,
    ) -> StoreResult<()> {
        self.settle(ctx, invitation_id, HouseholdInvitationStatus::Rejected, note)
            .annotate("reject household invitation", invitation_id)
    }

    fn accept_household_invitation(
        &self,
        ctx: &QueryContext,
        invitation_id: &str,
        token: &str,
        note: &str,
    ) -> StoreResult<Option<HouseholdUserMembership>> {
        require_id(invitation_id, "household invitation id")?;
        require_id(token, "invitation token")?;
        let now = self.runtime.now();
        let membership_id = self.runtime.new_id();

        let membership = run_in_session(self.conn, ctx, "accept household invitation", |session| {
            let invitation = fetch_invitation(
                session,
                ctx,
                "household_invitations.token = ?1 AND household_invitations.id = ?2",
                params![token, invitation_id],
            )?;
            ensure_acceptable(&invitation, now)?;

            let changed = set_invitation_status(
                session,
                ctx,
                now,
                invitation_id,
                HouseholdInvitationStatus::Accepted,
                note,
            )?;
            if changed != 1 {
                return Err(StoreError::conflict(format!(
                    "household invitation {invitation_id} is no longer pending"
                )));
            }

            match invitation.to_user {
                Some(user_id) => {
                    let input = HouseholdMembershipCreationInput {
                        id: membership_id.clone(),
                        household_id: invitation.destination_household,
                        user_id,
                        default_household: false,
                        role: HouseholdRole::HouseholdMember,
                        reason: acceptance_reason(invitation_id),
                    };
                    Ok(Some(add_user_to_household(session, ctx, now, &input)?))
                }
                None => Ok(None),
            }
        })
        .annotate("accept household invitation", invitation_id)?;

        info!(
            "event=household_invitation_accept module=repo status=ok id={invitation_id} membership_created={}",
            membership.is_some()
        );
        Ok(membership)
    }

    fn attach_invitations_to_user(
        &self,
        ctx: &QueryContext,
        email_address: &str,
        user_id: &str,
    ) -> StoreResult<usize> {
        require_id(email_address, "e-mail address")?;
        require_id(user_id, "user id")?;
        let attached = self
            .conn
            .execute_write(
                ctx,
                "household invitation attachment",
                "UPDATE household_invitations
                 SET to_user = ?2, last_updated_at = ?3
                 WHERE to_email = ?1
                   AND to_user IS NULL
                   AND status = 'pending'
                   AND archived_at IS NULL;",
                params![
                    normalize_email(email_address),
                    user_id,
                    time_to_db(self.runtime.now()),
                ],
            )
            .annotate("attach invitations to user", user_id)?;
        info!("event=household_invitation_attach module=repo status=ok user_id={user_id} count={attached}");
        Ok(attached)
    }

    fn accept_invitation_for_user<'s>(
        &self,
        ctx: &QueryContext,
        session: Session<'s>,
        input: &InvitationAcceptanceForUserInput,
    ) -> StoreResult<Session<'s>> {
        let outcome = accept_for_user(&session, ctx, &self.runtime, input);
        match outcome {
            Ok(invitation_id) => {
                info!(
                    "event=household_invitation_accept module=repo status=ok id={invitation_id} session={}",
                    session.label()
                );
                Ok(session)
            }
            Err(err) => {
                let label = session.label();
                if let Err(rollback_err) = session.rollback() {
                    warn!(
                        "event=session_rollback module=repo status=error session={label} error={rollback_err}"
                    );
                }
                Err(err).annotate("accept invitation for user", &input.user_id)
            }
        }
    }
}

fn accept_for_user(
    session: &Session<'_>,
    ctx: &QueryContext,
    runtime: &StoreRuntime,
    input: &InvitationAcceptanceForUserInput,
) -> StoreResult<String> {
    require_id(&input.user_id, "user id")?;
    require_id(&input.email_address, "e-mail address")?;
    require_id(&input.invitation_token, "invitation token")?;
    let now = runtime.now();

    let invitation = fetch_invitation(
        session,
        ctx,
        "household_invitations.to_email = ?1 AND household_invitations.token = ?2",
        params![normalize_email(&input.email_address), input.invitation_token],
    )?;
    ensure_acceptable(&invitation, now)?;

    let membership = HouseholdMembershipCreationInput {
        id: runtime.new_id(),
        household_id: invitation.destination_household.clone(),
        user_id: input.user_id.clone(),
        default_household: true,
        role: HouseholdRole::HouseholdMember,
        reason: acceptance_reason(&invitation.id),
    };
    add_user_to_household(session, ctx, now, &membership)?;

    let changed = set_invitation_status(
        session,
        ctx,
        now,
        &invitation.id,
        HouseholdInvitationStatus::Accepted,
        "",
    )?;
    if changed != 1 {
        return Err(StoreError::conflict(format!(
            "household invitation {} is no longer pending",
            invitation.id
        )));
    }
    Ok(invitation.id)
}

fn acceptance_reason(invitation_id: &str) -> String {
    format!("accepted household invitation {invitation_id:?}")
}

fn ensure_acceptable(invitation: &HouseholdInvitation, now: DateTime<Utc>) -> StoreResult<()> {
    if invitation.status != HouseholdInvitationStatus::Pending {
        return Err(StoreError::conflict(format!(
            "household invitation {} is already {}",
            invitation.id, invitation.status
        )));
    }
    if invitation.expires_at <= now {
        return Err(StoreError::conflict(format!(
            "household invitation {} has expired",
            invitation.id
        )));
    }
    Ok(())
}

/// Writes a terminal status only while the invitation is still pending.
fn set_invitation_status<E: QueryExecutor>(
    exec: &E,
    ctx: &QueryContext,
    now: DateTime<Utc>,
    invitation_id: &str,
    next: HouseholdInvitationStatus,
    note: &str,
) -> StoreResult<usize> {
    exec.execute_write(
        ctx,
        "household invitation status change",
        "UPDATE household_invitations
         SET status = ?2, status_note = ?3, last_updated_at = ?4
         WHERE id = ?1
           AND status = 'pending'
           AND archived_at IS NULL;",
        params![invitation_id, next.as_str(), note, time_to_db(now)],
    )
}

fn fetch_invitation<E: QueryExecutor, P: Params>(
    exec: &E,
    ctx: &QueryContext,
    predicate: &str,
    params: P,
) -> StoreResult<HouseholdInvitation> {
    let sql = format!(
        "SELECT {INVITATION_COLUMNS}
         FROM household_invitations
         WHERE {predicate}
           AND household_invitations.archived_at IS NULL;"
    );
    exec.read_one(ctx, "household invitation", &sql, params, invitation_from_row)
}

fn invitation_from_row(row: &Row<'_>) -> StoreResult<HouseholdInvitation> {
    Ok(HouseholdInvitation {
        id: row.get("id")?,
        destination_household: row.get("destination_household")?,
        from_user: row.get("from_user")?,
        to_user: row.get("to_user")?,
        to_name: row.get("to_name")?,
        to_email: row.get("to_email")?,
        token: row.get("token")?,
        note: row.get("note")?,
        status_note: row.get("status_note")?,
        status: get_enum(row, "status")?,
        expires_at: get_time(row, "expires_at")?,
        created_at: get_time(row, "created_at")?,
        last_updated_at: get_opt_time(row, "last_updated_at")?,
        archived_at: get_opt_time(row, "archived_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::acceptance_reason;

    #[test]
    fn acceptance_reason_quotes_the_invitation_id() {
        assert_eq!(
            acceptance_reason("inv1"),
            "accepted household invitation \"inv1\""
        );
    }
}
