//! Owner Resolution: bounded scatter-gather over multicall chunks
//!
//! Splits a token id list into chunks of `chunk_size`, issues one batched read
//! per chunk concurrently, and reassembles results by chunk index so output
//! order always equals input order, whatever order the chunks complete in.
//!
//! Created: 2026-10-06

use crate::chain::ChainReader;
use crate::error::{ChainError, ScanError};
use crate::types::TokenId;
use alloy::primitives::Address;
use futures::future::try_join_all;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

pub struct OwnerResolver {
    reader: Arc<dyn ChainReader>,
    chunk_size: usize,
}

impl OwnerResolver {
    pub fn new(reader: Arc<dyn ChainReader>, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Current owner of every token id on `token`, in input order
    pub async fn owners(
        &self,
        token: Address,
        token_ids: &[TokenId],
    ) -> Result<Vec<Address>, ScanError> {
        let reader = &self.reader;
        let owners = scatter_gather(token_ids, self.chunk_size, |chunk| async move {
            reader.owners_of(token, chunk).await
        })
        .await
        .map_err(|e| match e {
            GatherError::Read(source) => ScanError::OwnerRead {
                contract: token,
                source,
            },
            GatherError::Count { expected, got } => ScanError::OwnerCountMismatch { expected, got },
        })?;

        debug!("Resolved {} owners on {}", owners.len(), token);
        Ok(owners)
    }

    /// Like `owners`, but a token whose ownerOf reverts resolves to `None`
    pub async fn try_owners(
        &self,
        token: Address,
        token_ids: &[TokenId],
    ) -> Result<Vec<Option<Address>>, ScanError> {
        let reader = &self.reader;
        scatter_gather(token_ids, self.chunk_size, |chunk| async move {
            reader.try_owners_of(token, chunk).await
        })
        .await
        .map_err(|e| match e {
            GatherError::Read(source) => ScanError::OwnerRead {
                contract: token,
                source,
            },
            GatherError::Count { expected, got } => ScanError::OwnerCountMismatch { expected, got },
        })
    }

    /// `isApprovedForAll(owner, operator)` on `token` for every owner, in input order
    pub async fn approvals(
        &self,
        token: Address,
        owners: &[Address],
        operator: Address,
    ) -> Result<Vec<bool>, ScanError> {
        let reader = &self.reader;
        scatter_gather(owners, self.chunk_size, |chunk| async move {
            reader.approvals_for_all(token, chunk, operator).await
        })
        .await
        .map_err(|e| match e {
            GatherError::Read(source) => ScanError::ApprovalRead {
                contract: token,
                source,
            },
            GatherError::Count { expected, got } => ScanError::OwnerCountMismatch { expected, got },
        })
    }
}

pub(super) enum GatherError {
    Read(ChainError),
    Count { expected: usize, got: usize },
}

pub(super) async fn scatter_gather<'a, T, U, F, Fut>(
    items: &'a [T],
    chunk_size: usize,
    read: F,
) -> Result<Vec<U>, GatherError>
where
    F: Fn(&'a [T]) -> Fut,
    Fut: Future<Output = Result<Vec<U>, ChainError>>,
{
    let tasks = items.chunks(chunk_size).enumerate().map(|(index, chunk)| {
        let fut = read(chunk);
        async move { fut.await.map(|out| (index, chunk.len(), out)) }
    });
    let mut parts = try_join_all(tasks).await.map_err(GatherError::Read)?;

    parts.sort_by_key(|(index, _, _)| *index);
    let mut out = Vec::with_capacity(items.len());
    for (_, expected, part) in parts {
        if part.len() != expected {
            return Err(GatherError::Count {
                expected,
                got: part.len(),
            });
        }
        out.extend(part);
    }
    Ok(out)
}
