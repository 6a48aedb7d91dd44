use crate::api::{PortalClient, Transport};
use crate::error::ApiResult;
use crate::model::{EmergencyContact, Incident, IncidentStatus, NotificationEmail, Site};
use serde::Serialize;

/// Counters shown on the admin dashboard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub sites: usize,
    pub total_incidents: usize,
    pub open: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub closed: usize,
    pub contacts: usize,
    pub emails: usize,
}

impl DashboardStats {
    pub fn from_parts(
        sites: &[Site],
        incidents: &[Incident],
        contacts: &[EmergencyContact],
        emails: &[NotificationEmail],
    ) -> Self {
        let count = |status: IncidentStatus| incidents.iter().filter(|i| i.status == status).count();
        Self {
            sites: sites.len(),
            total_incidents: incidents.len(),
            open: count(IncidentStatus::Open),
            in_progress: count(IncidentStatus::InProgress),
            resolved: count(IncidentStatus::Resolved),
            closed: count(IncidentStatus::Closed),
            contacts: contacts.len(),
            emails: emails.len(),
        }
    }

    /// All four lists are fetched concurrently; any failure fails the whole.
    pub async fn load<T: Transport>(client: &PortalClient<T>) -> ApiResult<Self> {
        let (sites, incidents, contacts, emails) = futures::try_join!(
            client.sites(),
            client.incidents(),
            client.contacts(None),
            client.notification_emails()
        )?;
        Ok(Self::from_parts(&sites, &incidents, &contacts, &emails))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Method;
    use crate::testing::ScriptedTransport;
    use futures::executor::block_on;

    #[test]
    fn stats_are_joined_from_four_lists() {
        let client = PortalClient::new(ScriptedTransport::new());
        let t = client.transport();
        t.respond_json(Method::Get, "/sites/", 200, serde_json::json!([{"id": 1, "name": "A"}]));
        t.respond_json(
            Method::Get,
            "/incidents/",
            200,
            serde_json::json!({"results": [
                {"id": 1, "site": 1, "incident_type": 1, "status": "open"},
                {"id": 2, "site": 1, "incident_type": 1, "status": "open"},
                {"id": 3, "site": 1, "incident_type": 1, "status": "in_progress"},
                {"id": 4, "site": 1, "incident_type": 1, "status": "closed"}
            ]}),
        );
        t.respond_json(
            Method::Get,
            "/emergency-contacts/",
            200,
            serde_json::json!([{"id": 9, "site": 1, "name": "Guard", "phone_number": "+919876543210"}]),
        );
        t.respond_json(Method::Get, "/notification-emails/", 200, serde_json::json!([]));

        let stats = block_on(DashboardStats::load(&client)).expect("stats");
        assert_eq!(
            stats,
            DashboardStats {
                sites: 1,
                total_incidents: 4,
                open: 2,
                in_progress: 1,
                resolved: 0,
                closed: 1,
                contacts: 1,
                emails: 0,
            }
        );
    }

    #[test]
    fn one_failing_list_fails_the_dashboard() {
        let client = PortalClient::new(ScriptedTransport::new());
        client
            .transport()
            .respond_json(Method::Get, "/sites/", 401, serde_json::json!({}));
        let err = block_on(DashboardStats::load(&client)).expect_err("401");
        assert!(err.is_unauthorized());
    }
}
