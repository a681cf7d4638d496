//! Hub, forwarder and token contract interface
//!
//! Function selectors, gas limits, call encoding and the event lookups the
//! EVM client needs. Selectors of state-changing functions are fixed; view
//! functions are addressed through their canonical signatures.

use crate::coordination::ContractRole;
use crate::error::{UtilitiesError, UtilitiesResult};

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};
use ethers::utils::{id, keccak256};
use semver::Version;

pub const HUB_REGISTER_SERVICE_NODE_SELECTOR: [u8; 4] = [0x90, 0x14, 0x28, 0xb0];
pub const HUB_REGISTER_SERVICE_NODE_GAS: u64 = 300_000;

pub const HUB_COMMIT_HASH_SELECTOR: [u8; 4] = [0x3c, 0x37, 0xb6, 0x40];
pub const HUB_COMMIT_HASH_GAS: u64 = 250_000;

pub const HUB_TRANSFER_SELECTOR: [u8; 4] = [0x87, 0xd2, 0x8c, 0xd6];
pub const HUB_TRANSFER_GAS: u64 = 200_000;

pub const HUB_TRANSFER_FROM_SELECTOR: [u8; 4] = [0xa6, 0xd8, 0x56, 0xe0];
pub const HUB_TRANSFER_FROM_GAS: u64 = 250_000;

pub const HUB_UNREGISTER_SERVICE_NODE_SELECTOR: [u8; 4] = [0xa3, 0x5a, 0x27, 0x8d];
pub const HUB_UNREGISTER_SERVICE_NODE_GAS: u64 = 250_000;

pub const HUB_CANCEL_SERVICE_NODE_UNREGISTRATION_SELECTOR: [u8; 4] = [0x13, 0xca, 0xd6, 0x93];
pub const HUB_CANCEL_SERVICE_NODE_UNREGISTRATION_GAS: u64 = 250_000;

pub const HUB_UPDATE_SERVICE_NODE_URL_SELECTOR: [u8; 4] = [0x4b, 0xbf, 0xe4, 0xf6];
pub const HUB_UPDATE_SERVICE_NODE_URL_GAS: u64 = 250_000;

pub const TOKEN_APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];
pub const TOKEN_APPROVE_GAS: u64 = 100_000;

/// Revert reasons of the hub's transfer verification
pub const INSUFFICIENT_BALANCE_ERROR: &str = "VisionHub: insufficient balance of sender";
pub const INVALID_SIGNATURE_ERROR: &str = "VisionForwarder: invalid signature";

const TRANSFER_REQUEST: &str = "(address,address,address,uint256,address,uint256,uint256,uint256)";
const TRANSFER_FROM_REQUEST: &str =
    "(uint256,address,string,address,string,uint256,address,uint256,uint256,uint256)";

pub const GET_SERVICE_NODE_RECORD: &str = "getServiceNodeRecord(address)";
pub const GET_EXTERNAL_TOKEN_RECORD: &str = "getExternalTokenRecord(address,uint256)";
pub const GET_CURRENT_MINIMUM_SERVICE_NODE_DEPOSIT: &str = "getCurrentMinimumServiceNodeDeposit()";
pub const IS_SERVICE_NODE_IN_THE_UNBONDING_PERIOD: &str =
    "isServiceNodeInTheUnbondingPeriod(address)";
pub const GET_COMMITMENT_WAIT_PERIOD: &str = "getCommitmentWaitPeriod()";
pub const GET_CURRENT_VALIDATOR_FEE_FACTOR: &str = "getCurrentValidatorFeeFactor(uint256)";
pub const TOKEN_BALANCE_OF: &str = "balanceOf(address)";

pub fn verify_transfer_signature() -> String {
    format!("verifyTransfer({},bytes)", TRANSFER_REQUEST)
}

pub fn verify_transfer_from_signature() -> String {
    format!("verifyTransferFrom({},bytes)", TRANSFER_FROM_REQUEST)
}

pub fn transfer_succeeded_event() -> String {
    format!("TransferSucceeded(uint256,{},bytes)", TRANSFER_REQUEST)
}

pub fn transfer_from_succeeded_event() -> String {
    format!("TransferFromSucceeded(uint256,{},bytes)", TRANSFER_FROM_REQUEST)
}

/// Calldata for a function selector and its arguments
pub fn encode_call(selector: [u8; 4], args: &[Token]) -> Bytes {
    let mut data = selector.to_vec();
    data.extend(abi::encode(args));
    data.into()
}

/// Calldata for a view function given by its signature
pub fn encode_view(signature: &str, args: &[Token]) -> Bytes {
    encode_call(id(signature), args)
}

pub fn decode_output(types: &[ParamType], data: &[u8]) -> UtilitiesResult<Vec<Token>> {
    abi::decode(types, data).map_err(|e| UtilitiesError::Abi(e.to_string()))
}

/// Service node record as stored by the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNodeRecord {
    pub active: bool,
    pub url: String,
    pub deposit: U256,
    pub withdrawal_address: Address,
    pub unregister_time: U256,
}

pub fn decode_service_node_record(data: &[u8]) -> UtilitiesResult<ServiceNodeRecord> {
    let record = ParamType::Tuple(vec![
        ParamType::Bool,
        ParamType::String,
        ParamType::Uint(256),
        ParamType::Address,
        ParamType::Uint(256),
    ]);

    match decode_output(&[record], data)?.pop() {
        Some(Token::Tuple(fields)) => match fields.as_slice() {
            [Token::Bool(active), Token::String(url), Token::Uint(deposit), Token::Address(withdrawal_address), Token::Uint(unregister_time)] => {
                Ok(ServiceNodeRecord {
                    active: *active,
                    url: url.clone(),
                    deposit: *deposit,
                    withdrawal_address: *withdrawal_address,
                    unregister_time: *unregister_time,
                })
            }
            _ => Err(UtilitiesError::Abi("malformed service node record".to_string())),
        },
        _ => Err(UtilitiesError::Abi("malformed service node record".to_string())),
    }
}

pub fn decode_external_token_record(data: &[u8]) -> UtilitiesResult<(bool, String)> {
    let record = ParamType::Tuple(vec![ParamType::Bool, ParamType::String]);

    match decode_output(&[record], data)?.pop() {
        Some(Token::Tuple(fields)) => match fields.as_slice() {
            [Token::Bool(active), Token::String(address)] => Ok((*active, address.clone())),
            _ => Err(UtilitiesError::Abi("malformed external token record".to_string())),
        },
        _ => Err(UtilitiesError::Abi("malformed external token record".to_string())),
    }
}

pub fn decode_uint(data: &[u8]) -> UtilitiesResult<U256> {
    match decode_output(&[ParamType::Uint(256)], data)?.pop() {
        Some(Token::Uint(value)) => Ok(value),
        _ => Err(UtilitiesError::Abi("expected uint256".to_string())),
    }
}

pub fn decode_bool(data: &[u8]) -> UtilitiesResult<bool> {
    match decode_output(&[ParamType::Bool], data)?.pop() {
        Some(Token::Bool(value)) => Ok(value),
        _ => Err(UtilitiesError::Abi("expected bool".to_string())),
    }
}

/// Solidity-packed keccak of typed values
pub fn commitment(values: &[Token]) -> UtilitiesResult<H256> {
    let packed = abi::encode_packed(values).map_err(|e| UtilitiesError::Abi(e.to_string()))?;
    Ok(H256::from(keccak256(packed)))
}

/// First word of the data of the hub log matching `event_signature`
pub fn read_event_transfer_id(
    receipt: &TransactionReceipt,
    hub: Address,
    event_signature: &str,
) -> Option<U256> {
    let topic = H256::from(keccak256(event_signature.as_bytes()));

    receipt
        .logs
        .iter()
        .filter(|log| log.address == hub)
        .filter(|log| log.topics.first() == Some(&topic))
        .find(|log| log.data.len() >= 32)
        .map(|log| U256::from_big_endian(&log.data[..32]))
}

/// Selectors a contract must implement for a protocol version
pub fn required_selectors(role: ContractRole, version: &Version) -> Vec<[u8; 4]> {
    let mut selectors = match role {
        ContractRole::Hub => vec![
            HUB_REGISTER_SERVICE_NODE_SELECTOR,
            HUB_TRANSFER_SELECTOR,
            HUB_TRANSFER_FROM_SELECTOR,
            HUB_UNREGISTER_SERVICE_NODE_SELECTOR,
            HUB_CANCEL_SERVICE_NODE_UNREGISTRATION_SELECTOR,
            HUB_UPDATE_SERVICE_NODE_URL_SELECTOR,
            id(GET_SERVICE_NODE_RECORD),
            id(GET_EXTERNAL_TOKEN_RECORD),
            id(GET_CURRENT_MINIMUM_SERVICE_NODE_DEPOSIT),
            id(IS_SERVICE_NODE_IN_THE_UNBONDING_PERIOD),
            id(GET_CURRENT_VALIDATOR_FEE_FACTOR),
            id(verify_transfer_signature()),
            id(verify_transfer_from_signature()),
        ],
        ContractRole::Forwarder => vec![
            id(format!("verifyAndForwardTransfer({},bytes)", TRANSFER_REQUEST)),
            id(format!("verifyAndForwardTransferFrom({},bytes)", TRANSFER_FROM_REQUEST)),
        ],
        ContractRole::Token => vec![TOKEN_APPROVE_SELECTOR, id(TOKEN_BALANCE_OF)],
    };

    if crate::protocol::requires_commitment(version) {
        match role {
            ContractRole::Hub => {
                selectors.push(HUB_COMMIT_HASH_SELECTOR);
                selectors.push(id(GET_COMMITMENT_WAIT_PERIOD));
            }
            ContractRole::Forwarder => {
                selectors.push(id("getMinimumValidatorNodeSignatures()"));
            }
            ContractRole::Token => {}
        }
    }

    selectors
}

/// Whether deployed bytecode dispatches every selector.
///
/// Solidity dispatchers compare the calldata selector against `PUSH4`
/// constants, so each selector must appear as a `PUSH4` operand.
pub fn bytecode_supports(code: &[u8], selectors: &[[u8; 4]]) -> bool {
    const PUSH4: u8 = 0x63;

    !code.is_empty()
        && selectors.iter().all(|selector| {
            code.windows(5)
                .any(|window| window[0] == PUSH4 && window[1..] == selector[..])
        })
}
