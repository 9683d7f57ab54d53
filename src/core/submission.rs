use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::core::sequence::{AllocationError, SequenceAllocator};
use crate::models::{
    Namespace, Provider, ProviderDraft, ProviderStatus, Request, RequestDraft, RequestStatus,
};
use crate::services::{IdentityError, IdentityProvider, ProviderStore, RequestFilter, RequestStore, StoreError};

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("{0}")]
    Identity(#[from] IdentityError),

    #[error("Invalid submission: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Guardian and caregiver self-service submissions
#[derive(Clone)]
pub struct SubmissionService {
    allocator: SequenceAllocator,
    requests: Arc<dyn RequestStore>,
    providers: Arc<dyn ProviderStore>,
}

impl SubmissionService {
    pub fn new(
        allocator: SequenceAllocator,
        requests: Arc<dyn RequestStore>,
        providers: Arc<dyn ProviderStore>,
    ) -> Self {
        Self {
            allocator,
            requests,
            providers,
        }
    }

    /// Validate, number and save a care request as `pending`
    pub async fn submit_request(
        &self,
        identity: &dyn IdentityProvider,
        draft: RequestDraft,
    ) -> Result<Request, SubmissionError> {
        let user = identity.current_user()?;
        draft.validate()?;

        let serial_number = self.allocator.allocate(Namespace::Request).await?;
        let mut request = Request {
            id: String::new(),
            serial_number,
            user_id: user.user_id,
            patient_name: draft.patient_name,
            guardian_name: draft.guardian_name,
            patient_condition: draft.patient_condition,
            care_start_date: draft.care_start_date,
            care_end_date: draft.care_end_date,
            location: draft.location.trim().to_string(),
            patient_phone_number: draft.patient_phone_number.filter(|p| !p.trim().is_empty()),
            guardian_phone_number: draft.guardian_phone_number,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };
        request.id = self.requests.save(&request).await?;

        tracing::info!(
            "Care request {} submitted by {}",
            serial_number.value(),
            request.user_id
        );
        Ok(request)
    }

    /// Validate, number and save a caregiver registration as `pending`
    pub async fn register_provider(
        &self,
        identity: &dyn IdentityProvider,
        draft: ProviderDraft,
    ) -> Result<Provider, SubmissionError> {
        let user = identity.current_user()?;
        draft.validate()?;

        let serial_number = self.allocator.allocate(Namespace::Provider).await?;
        let mut provider = Provider {
            id: String::new(),
            serial_number,
            user_id: user.user_id,
            name: draft.name,
            experience: draft.experience,
            certificates: draft.certificates,
            available_regions: draft
                .available_regions
                .iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            phone_number: draft.phone_number,
            status: ProviderStatus::Pending,
            created_at: Utc::now(),
        };
        provider.id = self.providers.save(&provider).await?;

        tracing::info!(
            "Caregiver {} registered by {}",
            serial_number.value(),
            provider.user_id
        );
        Ok(provider)
    }

    /// The current user's requests, newest first
    pub async fn my_requests(
        &self,
        identity: &dyn IdentityProvider,
    ) -> Result<Vec<Request>, SubmissionError> {
        let user = identity.current_user()?;
        Ok(self.requests.list(&RequestFilter::owned_by(user.user_id)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        DocumentProviderStore, DocumentRequestStore, Identity, InMemoryDocumentStore,
        MockIdentityProvider, StaticIdentity,
    };
    use chrono::NaiveDate;

    fn service() -> SubmissionService {
        let docs = Arc::new(InMemoryDocumentStore::new());
        SubmissionService::new(
            SequenceAllocator::new(docs.clone(), "counters", 5),
            Arc::new(DocumentRequestStore::new(docs.clone(), "care_requests")),
            Arc::new(DocumentProviderStore::new(docs, "caregivers")),
        )
    }

    fn draft() -> RequestDraft {
        RequestDraft {
            patient_name: "홍길동".to_string(),
            guardian_name: "홍부모".to_string(),
            patient_condition: String::new(),
            care_start_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            care_end_date: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
            location: " 서울 ".to_string(),
            patient_phone_number: Some(" ".to_string()),
            guardian_phone_number: "010-1234-5678".to_string(),
        }
    }

    #[tokio::test]
    async fn test_submit_request_numbers_and_saves() {
        let service = service();
        let guardian = StaticIdentity::new(Identity::user("guardian-1"));

        let first = service.submit_request(&guardian, draft()).await.unwrap();
        let second = service.submit_request(&guardian, draft()).await.unwrap();

        assert_eq!(first.serial_number.value(), 1001);
        assert_eq!(second.serial_number.value(), 1002);
        assert_eq!(first.status, RequestStatus::Pending);
        assert_eq!(first.location, "서울");
        assert!(first.patient_phone_number.is_none());
        assert!(!first.id.is_empty());

        let mine = service.my_requests(&guardian).await.unwrap();
        assert_eq!(mine.len(), 2);

        let stranger = StaticIdentity::new(Identity::user("guardian-2"));
        assert!(service.my_requests(&stranger).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unauthenticated_submission_is_identity_error() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_current_user()
            .returning(|| Err(IdentityError::Unauthenticated));

        let result = service().submit_request(&identity, draft()).await;
        assert!(matches!(
            result,
            Err(SubmissionError::Identity(IdentityError::Unauthenticated))
        ));
    }

    #[tokio::test]
    async fn test_invalid_draft_does_not_consume_serial() {
        let service = service();
        let guardian = StaticIdentity::new(Identity::user("guardian-1"));

        let mut bad = draft();
        bad.care_end_date = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        assert!(matches!(
            service.submit_request(&guardian, bad).await,
            Err(SubmissionError::Invalid(_))
        ));

        let ok = service.submit_request(&guardian, draft()).await.unwrap();
        assert_eq!(ok.serial_number.value(), 1001);
    }

    #[tokio::test]
    async fn test_register_provider() {
        let service = service();
        let caregiver = StaticIdentity::new(Identity::user("cg-1"));

        let provider = service
            .register_provider(
                &caregiver,
                ProviderDraft {
                    name: "김간병".to_string(),
                    experience: "3년".to_string(),
                    certificates: "요양보호사".to_string(),
                    available_regions: vec!["서울".to_string(), " 경기".to_string(), "".to_string()],
                    phone_number: "010-2222-3333".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(provider.serial_number.value(), 2001);
        assert_eq!(provider.status, ProviderStatus::Pending);
        assert!(provider.serves("경기"));
        assert_eq!(provider.available_regions.len(), 2);
    }
}
