//! Deployed-contract access: read-only calls, state-changing sends,
//! deployment and receipt polling.

use std::time::Duration;

use alloy_primitives::{B256, U256};
use tokio::time::{sleep, Instant};

use crate::abi::{self, AbiEntry, AbiValue, ContractInterface, DecodedLog};
use crate::address::Address;
use crate::config::ClientConfig;
use crate::error::EthError;
use crate::keys::Account;
use crate::rpc::{BlockNumber, CallRequest, Log, LogFilter, Receipt, RpcClient};
use crate::submit::{self, SendOptions};
use crate::transaction::TransactionBuilder;

/// A contract at a known address, bound to its interface and a client.
#[derive(Debug, Clone)]
pub struct ContractProxy {
    address: Address,
    interface: ContractInterface,
    rpc: RpcClient,
    config: ClientConfig,
}

impl ContractProxy {
    pub fn new(
        address: Address,
        interface: ContractInterface,
        rpc: RpcClient,
        config: ClientConfig,
    ) -> Self {
        Self {
            address,
            interface,
            rpc,
            config,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn interface(&self) -> &ContractInterface {
        &self.interface
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Calls `function` (name or signature) with `eth_call` and decodes its
    /// return values. No transaction is created.
    pub async fn call(&self, function: &str, args: &[AbiValue]) -> Result<Vec<AbiValue>, EthError> {
        let entry = self.interface.function(function)?;
        self.call_entry(entry, args).await
    }

    pub async fn call_entry(
        &self,
        entry: &AbiEntry,
        args: &[AbiValue],
    ) -> Result<Vec<AbiValue>, EthError> {
        let data = abi::encode_call(entry, args)?;
        tracing::debug!(contract = %self.address, function = %entry.signature(), "eth_call");

        let returned = self
            .rpc
            .call(&CallRequest {
                from: None,
                to: self.address,
                data: data.into(),
            })
            .await?;
        abi::decode_return(entry, &returned)
    }

    /// Invokes `function` in a signed transaction from `account` and returns
    /// the transaction hash without waiting for it to be mined.
    ///
    /// The gas limit defaults to `call_gas_limit` from the configuration.
    #[tracing::instrument(skip(self, args, account, options), fields(contract = %self.address))]
    pub async fn send(
        &self,
        function: &str,
        args: &[AbiValue],
        account: &Account,
        options: SendOptions,
    ) -> Result<B256, EthError> {
        let entry = self.interface.function(function)?;
        if options.value > U256::ZERO && !entry.is_payable() {
            return Err(EthError::TransactionBuild(format!(
                "{} is not payable",
                entry.signature()
            )));
        }

        let data = abi::encode_call(entry, args)?;
        let builder = TransactionBuilder::new(self.config.chain_id)
            .to(self.address)
            .data(data);
        let tx = options
            .apply(builder, Some(self.config.call_gas_limit))
            .build_with(account.address(), &self.rpc)
            .await?;

        submit::send_transaction(&self.rpc, account, &tx).await
    }

    /// Deploys `bytecode` with constructor `args`, waits for the receipt and
    /// returns the new contract's address.
    ///
    /// The gas limit defaults to `deploy_gas_limit` from `config`.
    pub async fn deploy(
        rpc: &RpcClient,
        interface: &ContractInterface,
        bytecode: &[u8],
        args: &[AbiValue],
        account: &Account,
        config: &ClientConfig,
        options: SendOptions,
    ) -> Result<Address, EthError> {
        let mut data = bytecode.to_vec();
        match interface.constructor() {
            Some(constructor) => data.extend_from_slice(&abi::encode_call(constructor, args)?),
            None if args.is_empty() => {}
            None => {
                return Err(EthError::AbiEncode(format!(
                    "interface has no constructor but {} arguments were given",
                    args.len()
                )))
            }
        }

        let tx = options
            .apply(
                TransactionBuilder::new(config.chain_id).data(data),
                Some(config.deploy_gas_limit),
            )
            .build_with(account.address(), rpc)
            .await?;
        let tx_hash = submit::send_transaction(rpc, account, &tx).await?;

        let receipt =
            wait_for_receipt(rpc, tx_hash, config.receipt_timeout(), config.poll_interval()).await?;
        if !receipt.succeeded() {
            return Err(EthError::DeploymentFailed(format!(
                "transaction {tx_hash} reverted"
            )));
        }
        let address = receipt.contract_address.ok_or_else(|| {
            EthError::DeploymentFailed(format!("receipt for {tx_hash} has no contract address"))
        })?;

        tracing::info!(%address, %tx_hash, "contract deployed");
        Ok(address)
    }

    /// Waits for `tx_hash` with the configured timeout and poll interval.
    pub async fn wait(&self, tx_hash: B256) -> Result<Receipt, EthError> {
        wait_for_receipt(
            &self.rpc,
            tx_hash,
            self.config.receipt_timeout(),
            self.config.poll_interval(),
        )
        .await
    }

    /// Fetches and decodes the logs of `event_name` emitted by this contract
    /// in the given block range.
    pub async fn events(
        &self,
        event_name: &str,
        from_block: BlockNumber,
        to_block: BlockNumber,
    ) -> Result<Vec<(Log, DecodedLog)>, EthError> {
        let event = self.interface.event(event_name)?;
        let filter = LogFilter::for_event(self.address, event)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self.rpc.get_logs(&filter).await?;
        tracing::debug!(event = %event.signature(), count = logs.len(), "fetched logs");

        logs.into_iter()
            .map(|log| {
                let decoded = abi::decode_log(event, &log)?;
                Ok((log, decoded))
            })
            .collect()
    }
}

/// Polls `eth_getTransactionReceipt` every `poll_interval` until a receipt
/// appears.
///
/// The first poll is immediate. The last one happens at the deadline, after
/// which the result is `ReceiptTimeout` with no further calls. A timeout too
/// large to represent as an instant means no deadline. A reverted
/// transaction still yields its receipt.
pub async fn wait_for_receipt(
    rpc: &RpcClient,
    tx_hash: B256,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Receipt, EthError> {
    let started = Instant::now();
    let deadline = started.checked_add(timeout);

    loop {
        if let Some(receipt) = rpc.get_transaction_receipt(tx_hash).await? {
            tracing::info!(
                %tx_hash,
                block = receipt.block_number,
                success = receipt.succeeded(),
                "transaction mined"
            );
            return Ok(receipt);
        }

        let now = Instant::now();
        let wait = match deadline {
            Some(deadline) if now >= deadline => {
                tracing::warn!(%tx_hash, ?timeout, "gave up waiting for receipt");
                return Err(EthError::ReceiptTimeout {
                    tx_hash,
                    waited: started.elapsed(),
                });
            }
            // Shorten the final sleep so the last poll lands on the deadline.
            Some(deadline) => poll_interval.min(deadline.saturating_duration_since(now)),
            None => poll_interval,
        };

        tracing::debug!(%tx_hash, "transaction pending");
        sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock::MockTransport;
    use crate::rpc::ReceiptStatus;
    use serde_json::{json, Value};
    use std::sync::Arc;

    const COUNTER_ABI: &str = r#"[
        {"type":"constructor","inputs":[{"name":"start","type":"uint256"}]},
        {"type":"function","name":"count","stateMutability":"view","inputs":[],
         "outputs":[{"name":"","type":"uint256"}]},
        {"type":"function","name":"add","stateMutability":"nonpayable",
         "inputs":[{"name":"by","type":"uint256"}],"outputs":[]},
        {"type":"event","name":"Added","anonymous":false,"inputs":[
            {"name":"who","type":"address","indexed":true},
            {"name":"by","type":"uint256","indexed":false}]}
    ]"#;

    const CONTRACT: Address = Address([0xcc; 20]);

    fn scalar_one() -> Account {
        let mut key = [0u8; 32];
        key[31] = 1;
        Account::from_private_key(&key).unwrap()
    }

    fn proxy(mock: &Arc<MockTransport>) -> ContractProxy {
        let config = ClientConfig::default();
        ContractProxy::new(
            CONTRACT,
            ContractInterface::from_json(COUNTER_ABI).unwrap(),
            RpcClient::new(mock.clone(), &config),
            config,
        )
    }

    fn word(n: u64) -> String {
        format!("0x{}", hex::encode(U256::from(n).to_be_bytes::<32>()))
    }

    fn sent_transaction(mock: &MockTransport) -> crate::signer::SignedTransaction {
        let calls = mock.calls_to("eth_sendRawTransaction");
        let raw_hex = calls[0].params[0].as_str().unwrap().to_string();
        let raw = hex::decode(raw_hex.trim_start_matches("0x")).unwrap();
        crate::signer::SignedTransaction::decode(&raw).unwrap()
    }

    #[tokio::test]
    async fn call_encodes_and_decodes_through_eth_call() {
        let mock = MockTransport::new();
        mock.push_result("eth_call", json!(word(41)));

        let out = proxy(&mock).call("count", &[]).await.unwrap();
        assert_eq!(out, vec![AbiValue::from(41u64)]);

        let calls = mock.calls_to("eth_call");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].params[1], json!("latest"));
        assert!(mock.calls_to("eth_sendRawTransaction").is_empty());
    }

    #[tokio::test]
    async fn call_to_unknown_function_makes_no_request() {
        let mock = MockTransport::new();
        let err = proxy(&mock).call("reset", &[]).await.unwrap_err();
        assert!(matches!(err, EthError::UnknownEntry(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn send_uses_configured_call_gas_limit() {
        let mock = MockTransport::new();
        mock.push_result("eth_getTransactionCount", json!("0x2"));
        mock.push_result("eth_gasPrice", json!("0x1"));
        mock.push_result("eth_getBalance", json!("0xde0b6b3a7640000"));
        mock.push_result("eth_sendRawTransaction", json!(B256::repeat_byte(1)));

        let account = scalar_one();
        let p = proxy(&mock);
        let hash = p
            .send("add", &[AbiValue::from(5u64)], &account, SendOptions::default())
            .await
            .unwrap();
        assert_eq!(hash, B256::repeat_byte(1));

        let signed = sent_transaction(&mock);
        assert_eq!(signed.tx.to, Some(CONTRACT));
        assert_eq!(signed.tx.nonce, 2);
        assert_eq!(signed.tx.gas_limit, 2_000_000);
        let entry = p.interface().function("add").unwrap();
        assert_eq!(
            abi::decode_input(entry, &signed.tx.data).unwrap(),
            vec![AbiValue::from(5u64)]
        );
    }

    #[tokio::test]
    async fn value_on_non_payable_function_rejected() {
        let mock = MockTransport::new();
        let err = proxy(&mock)
            .send(
                "add",
                &[AbiValue::from(1u64)],
                &scalar_one(),
                SendOptions::default().with_value(U256::from(1)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EthError::TransactionBuild(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn send_checks_funds_against_gas_allowance() {
        let mock = MockTransport::new();
        mock.push_result("eth_getBalance", json!("0x1"));

        let err = proxy(&mock)
            .send(
                "add",
                &[AbiValue::from(1u64)],
                &scalar_one(),
                SendOptions::default().with_nonce(0).with_gas_price(U256::from(1)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EthError::InsufficientFunds { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_returns_contract_address() {
        let mock = MockTransport::new();
        let tx_hash = B256::repeat_byte(0x0d);
        let deployed = Address([0xdd; 20]);
        mock.push_result("eth_getTransactionCount", json!("0x0"));
        mock.push_result("eth_gasPrice", json!("0x1"));
        mock.push_result("eth_getBalance", json!("0xde0b6b3a7640000"));
        mock.push_result("eth_sendRawTransaction", json!(tx_hash));
        mock.push_result("eth_getTransactionReceipt", Value::Null);
        mock.push_result(
            "eth_getTransactionReceipt",
            MockTransport::receipt_json(tx_hash, "0x1", Some(deployed)),
        );

        let config = ClientConfig::default();
        let rpc = RpcClient::new(mock.clone(), &config);
        let iface = ContractInterface::from_json(COUNTER_ABI).unwrap();
        let bytecode = [0x60, 0x80, 0x60, 0x40, 0x52];

        let address = ContractProxy::deploy(
            &rpc,
            &iface,
            &bytecode,
            &[AbiValue::from(7u64)],
            &scalar_one(),
            &config,
            SendOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(address, deployed);

        let signed = sent_transaction(&mock);
        assert_eq!(signed.tx.to, None);
        assert_eq!(signed.tx.gas_limit, 3_000_000);
        // Init code followed by the constructor argument, no selector.
        assert_eq!(&signed.tx.data[..5], &bytecode);
        assert_eq!(&signed.tx.data[5..], &U256::from(7).to_be_bytes::<32>());
    }

    #[tokio::test(start_paused = true)]
    async fn reverted_deployment_fails() {
        let mock = MockTransport::new();
        let tx_hash = B256::repeat_byte(0x0e);
        mock.push_result("eth_getBalance", json!("0xde0b6b3a7640000"));
        mock.push_result("eth_sendRawTransaction", json!(tx_hash));
        mock.push_result(
            "eth_getTransactionReceipt",
            MockTransport::receipt_json(tx_hash, "0x0", None),
        );

        let config = ClientConfig::default();
        let rpc = RpcClient::new(mock.clone(), &config);
        let iface = ContractInterface::from_json(COUNTER_ABI).unwrap();

        let err = ContractProxy::deploy(
            &rpc,
            &iface,
            &[0x00],
            &[AbiValue::from(1u64)],
            &scalar_one(),
            &config,
            SendOptions::default().with_nonce(0).with_gas_price(U256::from(1)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EthError::DeploymentFailed(_)));
    }

    #[tokio::test]
    async fn deploy_without_constructor_rejects_arguments() {
        let mock = MockTransport::new();
        let config = ClientConfig::default();
        let rpc = RpcClient::new(mock.clone(), &config);

        let err = ContractProxy::deploy(
            &rpc,
            &ContractInterface::default(),
            &[0x00],
            &[AbiValue::from(1u64)],
            &scalar_one(),
            &config,
            SendOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EthError::AbiEncode(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn receipt_polls_are_spaced_by_interval() {
        let mock = MockTransport::new();
        let tx_hash = B256::repeat_byte(0x42);
        mock.push_result("eth_getTransactionReceipt", Value::Null);
        mock.push_result("eth_getTransactionReceipt", Value::Null);
        mock.push_result(
            "eth_getTransactionReceipt",
            MockTransport::receipt_json(tx_hash, "0x1", None),
        );
        let rpc = RpcClient::new(mock.clone(), &ClientConfig::default());

        let receipt = wait_for_receipt(
            &rpc,
            tx_hash,
            Duration::from_secs(30),
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert_eq!(receipt.transaction_hash, tx_hash);

        let polls = mock.calls_to("eth_getTransactionReceipt");
        assert_eq!(polls.len(), 3);
        assert_eq!(polls[1].at - polls[0].at, Duration::from_secs(2));
        assert_eq!(polls[2].at - polls[1].at, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn reverted_transaction_is_a_receipt_not_an_error() {
        let mock = MockTransport::new();
        let tx_hash = B256::repeat_byte(0x43);
        mock.push_result(
            "eth_getTransactionReceipt",
            MockTransport::receipt_json(tx_hash, "0x0", None),
        );
        let rpc = RpcClient::new(mock.clone(), &ClientConfig::default());

        let receipt = wait_for_receipt(&rpc, tx_hash, Duration::from_secs(5), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Failure);
    }

    #[tokio::test(start_paused = true)]
    async fn receipt_timeout_stops_polling_at_deadline() {
        let mock = MockTransport::new();
        let tx_hash = B256::repeat_byte(0x44);
        mock.set_default("eth_getTransactionReceipt", Value::Null);
        let rpc = RpcClient::new(mock.clone(), &ClientConfig::default());

        let started = Instant::now();
        let err = wait_for_receipt(&rpc, tx_hash, Duration::from_secs(3), Duration::from_secs(1))
            .await
            .unwrap_err();

        match err {
            EthError::ReceiptTimeout { tx_hash: hash, waited } => {
                assert_eq!(hash, tx_hash);
                assert_eq!(waited, Duration::from_secs(3));
            }
            other => panic!("expected ReceiptTimeout, got {other:?}"),
        }

        let polls = mock.calls_to("eth_getTransactionReceipt");
        assert_eq!(polls.len(), 4);
        assert!(polls.iter().all(|p| p.at - started <= Duration::from_secs(3)));

        // Nothing is polled once the error has been returned.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(mock.calls_to("eth_getTransactionReceipt").len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn final_poll_lands_on_deadline() {
        let mock = MockTransport::new();
        let tx_hash = B256::repeat_byte(0x45);
        mock.set_default("eth_getTransactionReceipt", Value::Null);
        let rpc = RpcClient::new(mock.clone(), &ClientConfig::default());

        let started = Instant::now();
        let err = wait_for_receipt(&rpc, tx_hash, Duration::from_millis(3_500), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EthError::ReceiptTimeout { waited, .. } if waited == Duration::from_millis(3_500)
        ));

        let offsets: Vec<Duration> = mock
            .calls_to("eth_getTransactionReceipt")
            .iter()
            .map(|p| p.at - started)
            .collect();
        assert_eq!(
            offsets,
            vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3),
                Duration::from_millis(3_500),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_timeout_waits_without_deadline() {
        let mock = MockTransport::new();
        let tx_hash = B256::repeat_byte(0x46);
        mock.push_result("eth_getTransactionReceipt", Value::Null);
        mock.push_result(
            "eth_getTransactionReceipt",
            MockTransport::receipt_json(tx_hash, "0x1", None),
        );
        let rpc = RpcClient::new(mock.clone(), &ClientConfig::default());

        let receipt = wait_for_receipt(&rpc, tx_hash, Duration::MAX, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(receipt.transaction_hash, tx_hash);
        assert_eq!(mock.calls_to("eth_getTransactionReceipt").len(), 2);
    }

    #[tokio::test]
    async fn events_filter_by_topic_and_decode() {
        let mock = MockTransport::new();
        let p = proxy(&mock);
        let added = p.interface().event("Added").unwrap().clone();
        let who = Address([0x77; 20]);
        let mut who_topic = [0u8; 32];
        who_topic[12..].copy_from_slice(who.as_bytes());

        mock.push_result(
            "eth_getLogs",
            json!([{
                "address": CONTRACT,
                "topics": [added.topic(), B256::from(who_topic)],
                "data": word(3),
                "blockNumber": "0x5",
                "transactionHash": B256::repeat_byte(9),
                "logIndex": "0x0",
                "removed": false
            }]),
        );

        let events = p
            .events("Added", BlockNumber::Number(1), BlockNumber::Latest)
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        let (log, decoded) = &events[0];
        assert_eq!(log.block_number, Some(5));
        assert_eq!(decoded.get("who").and_then(AbiValue::as_address), Some(who));
        assert_eq!(decoded.get("by").and_then(AbiValue::as_uint), Some(U256::from(3)));

        let calls = mock.calls_to("eth_getLogs");
        let filter = &calls[0].params[0];
        assert_eq!(filter["fromBlock"], json!("0x1"));
        assert_eq!(filter["toBlock"], json!("latest"));
        assert_eq!(filter["topics"][0], json!(added.topic()));
    }
}
