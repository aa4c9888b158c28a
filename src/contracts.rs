//! Contract ABIs and calldata helpers

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::errors::ChainError;

sol! {
    /// Wrapped native coin (WETH-style)
    interface IWrappedNative {
        function deposit() external payable;
        function withdraw(uint256 wad) external;
        function balanceOf(address owner) external view returns (uint256);
    }

    /// ERC20 allowance surface
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    /// Interaction contract deployed for the contract-call action
    interface IInteraction {
        function ping(uint256 amount) external payable;
    }
}

pub fn deposit_calldata() -> Bytes {
    IWrappedNative::depositCall {}.abi_encode().into()
}

pub fn withdraw_calldata(amount: U256) -> Bytes {
    IWrappedNative::withdrawCall { wad: amount }.abi_encode().into()
}

pub fn balance_of_calldata(owner: Address) -> Bytes {
    IWrappedNative::balanceOfCall { owner }.abi_encode().into()
}

pub fn allowance_calldata(owner: Address, spender: Address) -> Bytes {
    IERC20::allowanceCall { owner, spender }.abi_encode().into()
}

/// Unlimited approval
pub fn approve_max_calldata(spender: Address) -> Bytes {
    IERC20::approveCall {
        spender,
        amount: U256::MAX,
    }
    .abi_encode()
    .into()
}

pub fn ping_calldata(amount: U256) -> Bytes {
    IInteraction::pingCall { amount }.abi_encode().into()
}

/// Decode a single `uint256` return word
pub fn decode_u256(data: &[u8]) -> Result<U256, ChainError> {
    if data.len() < 32 {
        return Err(ChainError::Decoding(format!(
            "expected a 32-byte uint256 return, got {} bytes",
            data.len()
        )));
    }
    Ok(U256::from_be_slice(&data[..32]))
}
