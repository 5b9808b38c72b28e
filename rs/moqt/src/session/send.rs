use bytes::Bytes;

/// Identifies a buffer handed to the transport by [crate::Session::poll_send].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SendToken(usize);

impl std::fmt::Display for SendToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Buffers owned by the engine until the transport confirms they were sent.
#[derive(Debug, Default)]
pub(crate) struct PendingSends(slab::Slab<Bytes>);

impl PendingSends {
	pub fn insert(&mut self, buf: Bytes) -> SendToken {
		SendToken(self.0.insert(buf))
	}

	pub fn remove(&mut self, token: SendToken) -> Option<Bytes> {
		self.0.try_remove(token.0)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn release_once() {
		let mut pending = PendingSends::default();
		let a = pending.insert(Bytes::from_static(b"a"));
		let b = pending.insert(Bytes::from_static(b"b"));
		assert_ne!(a, b);
		assert_eq!(pending.len(), 2);

		assert_eq!(pending.remove(a), Some(Bytes::from_static(b"a")));
		assert_eq!(pending.remove(a), None);
		assert_eq!(pending.len(), 1);
	}
}
