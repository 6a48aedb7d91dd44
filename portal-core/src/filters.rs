//! Admin incidents list: filtering and optimistic status changes.

use crate::api::{PortalClient, Transport};
use crate::error::{ApiError, ApiResult};
use crate::model::{EntityId, Incident, IncidentStatus, Site};
use tracing::{info, warn};

/// AND-combined filters. An empty status filter hides closed incidents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IncidentFilter {
    pub site: Option<EntityId>,
    pub incident_type: Option<EntityId>,
    pub status: Option<IncidentStatus>,
}

impl IncidentFilter {
    pub fn matches(&self, incident: &Incident) -> bool {
        if self.site.as_ref().is_some_and(|s| s != &incident.site) {
            return false;
        }
        if self
            .incident_type
            .as_ref()
            .is_some_and(|t| t != &incident.incident_type)
        {
            return false;
        }
        match self.status {
            Some(status) => incident.status == status,
            None => incident.status != IncidentStatus::Closed,
        }
    }

    pub fn apply<'a>(&'a self, incidents: &'a [Incident]) -> impl Iterator<Item = &'a Incident> + 'a {
        incidents.iter().filter(move |i| self.matches(i))
    }
}

/// A status change applied locally and waiting for the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingStatus {
    pub incident: EntityId,
    pub previous: IncidentStatus,
    pub next: IncidentStatus,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct IncidentBoard {
    incidents: Vec<Incident>,
    sites: Vec<Site>,
    pub filter: IncidentFilter,
    error: Option<String>,
    loading: bool,
}

impl IncidentBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incidents(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn visible(&self) -> Vec<&Incident> {
        self.filter.apply(&self.incidents).collect()
    }

    pub fn site_name(&self, site: &EntityId) -> &str {
        self.sites
            .iter()
            .find(|s| &s.id == site)
            .map(|s| s.name.as_str())
            .unwrap_or("Unknown Site")
    }

    /// Sites for the filter select, by name.
    pub fn site_options(&self) -> Vec<&Site> {
        let mut sites: Vec<&Site> = self.sites.iter().collect();
        sites.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        sites
    }

    /// Distinct incident types seen in the list, labelled by display name.
    pub fn type_options(&self) -> Vec<(EntityId, String)> {
        let mut options: Vec<(EntityId, String)> = Vec::new();
        for incident in &self.incidents {
            if options.iter().any(|(id, _)| id == &incident.incident_type) {
                continue;
            }
            let label = incident
                .incident_type_display
                .clone()
                .unwrap_or_else(|| incident.incident_type.to_string());
            options.push((incident.incident_type.clone(), label));
        }
        options.sort_by(|a, b| a.1.cmp(&b.1));
        options
    }

    pub fn begin_load(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Failed fetches keep what was already on screen.
    pub fn finish_load(&mut self, result: ApiResult<(Vec<Incident>, Vec<Site>)>) -> ApiResult<()> {
        self.loading = false;
        match result {
            Ok((incidents, sites)) => {
                self.incidents = incidents;
                self.sites = sites;
                Ok(())
            }
            Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized),
            Err(err) => {
                warn!(error = %err, "incident list failed to load");
                self.error = Some(err.user_message());
                Ok(())
            }
        }
    }

    pub async fn load<T: Transport>(&mut self, client: &PortalClient<T>) -> ApiResult<()> {
        self.begin_load();
        let result = futures::try_join!(client.incidents(), client.sites());
        self.finish_load(result)
    }

    /// Applies `next` locally; `None` when the incident is unknown or
    /// already in that status.
    pub fn begin_status_change(
        &mut self,
        incident: &EntityId,
        next: IncidentStatus,
    ) -> Option<PendingStatus> {
        let entry = self.incidents.iter_mut().find(|i| &i.id == incident)?;
        if entry.status == next {
            return None;
        }
        let previous = entry.status;
        entry.status = next;
        Some(PendingStatus {
            incident: incident.clone(),
            previous,
            next,
        })
    }

    /// Keeps the optimistic value on success, restores the previous one on
    /// failure. Only `Unauthorized` is handed back.
    pub fn finish_status_change(
        &mut self,
        pending: PendingStatus,
        result: ApiResult<Incident>,
    ) -> ApiResult<()> {
        match result {
            Ok(stored) => {
                info!(incident = %pending.incident, status = %stored.status, "incident status updated");
                if let Some(entry) = self.incidents.iter_mut().find(|i| i.id == pending.incident) {
                    entry.status = stored.status;
                }
                Ok(())
            }
            Err(err) => {
                warn!(incident = %pending.incident, error = %err, "status change reverted");
                if let Some(entry) = self.incidents.iter_mut().find(|i| i.id == pending.incident) {
                    if entry.status == pending.next {
                        entry.status = pending.previous;
                    }
                }
                if err.is_unauthorized() {
                    return Err(err);
                }
                self.error = Some("Failed to update incident status.".into());
                Ok(())
            }
        }
    }

    pub async fn change_status<T: Transport>(
        &mut self,
        client: &PortalClient<T>,
        incident: &EntityId,
        next: IncidentStatus,
    ) -> ApiResult<()> {
        let Some(pending) = self.begin_status_change(incident, next) else {
            return Ok(());
        };
        let result = client.update_incident_status(incident, next).await;
        self.finish_status_change(pending, result)
    }
}
