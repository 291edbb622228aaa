//! Test doubles shared by the session layer tests

use async_trait::async_trait;
use bytes::Bytes;
use dlt645_core::MeterResult;
use dlt645_transport::StreamAccessor;
use mockall::mock;

mock! {
    pub Line {}

    #[async_trait]
    impl StreamAccessor for Line {
        fn port_name(&self) -> &str;
        fn bytes_available(&self) -> MeterResult<usize>;
        async fn read_available(&mut self) -> MeterResult<Bytes>;
        async fn write(&mut self, buf: &[u8]) -> MeterResult<usize>;
        async fn flush(&mut self) -> MeterResult<()>;
        fn is_closed(&self) -> bool;
        async fn close(&mut self) -> MeterResult<()>;
    }
}
