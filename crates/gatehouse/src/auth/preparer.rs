//! Challenge preparation.

use palisade_common::{
    wire_timestamp, ChallengeState, HashcashParams, HashcashPolicy, HashingPolicy, PalisadeError,
    PreparedChallenge, RequirementPolicy, ServerInstructions, TolerancePolicy,
};

use crate::captcha::CaptchaForge;
use crate::codec::StateCodec;
use crate::config::ChallengeSettings;
use crate::token::random_urlsafe;

/// Assemble one challenge: CAPTCHA grid, CSRF token, proof-of-work
/// parameters, and the encrypted state binding them together.
///
/// The plaintext state lives only inside this call; the client receives it
/// encrypted and must return it unmodified.
pub async fn prepare_challenge(
    codec: &StateCodec,
    captcha: &CaptchaForge,
    policy: &ChallengeSettings,
) -> Result<PreparedChallenge, PalisadeError> {
    let (captcha_uri, captcha_solutions) = captcha.generate()?;

    let csrf_token = random_urlsafe(policy.csrf_token_bytes);
    let server_string = random_urlsafe(policy.server_string_bytes);

    let state = ChallengeState {
        server_time: wire_timestamp(chrono::Utc::now()),
        captcha_solutions,
        csrf_token: csrf_token.clone(),
        hashcash: HashcashParams {
            server_string: server_string.clone(),
            zero_count: policy.hashcash_zero_count,
        },
    };

    let encrypted_state = codec.encrypt(&state).await?;

    tracing::debug!(
        zero_count = policy.hashcash_zero_count,
        "Challenge prepared"
    );

    Ok(PreparedChallenge {
        captcha: captcha_uri,
        state: encrypted_state,
        csrf_token,
        server_instructions: ServerInstructions {
            captcha: RequirementPolicy { require: true },
            hashcash: HashcashPolicy {
                require: true,
                zero_count: policy.hashcash_zero_count,
                server_string,
            },
            csrf_token: RequirementPolicy { require: true },
            tolerance: TolerancePolicy {
                minimum_characters_password: policy.password_min_length,
                minimum_alphabet_passphrase: policy.passphrase_min_length,
            },
            hashing: HashingPolicy {
                salt_hash_by_username: true,
                hash_cycles: policy.client_hash_cycles,
                result_length: policy.client_hash_length,
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captcha;
    use crate::codec::StateCodecConfig;

    #[tokio::test]
    async fn prepared_challenge_is_internally_consistent() {
        let root = captcha::testutil::image_tree(&[("otter", 3), ("heron", 3)]);
        let forge = CaptchaForge::new(root.path(), captcha::exact_name).unwrap();
        let codec = StateCodec::new(StateCodecConfig {
            aging_tolerance_secs: 120,
            renewal_frequency_secs: 0,
        })
        .unwrap();
        let policy = ChallengeSettings::default();

        let prepared = prepare_challenge(&codec, &forge, &policy).await.unwrap();

        assert!(prepared.captcha.starts_with("data:image/jpeg;base64,"));
        assert!(!prepared.csrf_token.is_empty());

        // The encrypted state must decrypt back to the issued secrets
        let state: ChallengeState = codec.decrypt(&prepared.state).await.unwrap();
        assert_eq!(state.csrf_token, prepared.csrf_token);
        assert_eq!(
            state.hashcash.server_string,
            prepared.server_instructions.hashcash.server_string
        );
        assert_eq!(state.hashcash.zero_count, policy.hashcash_zero_count);

        // The solution set is closed over the known category names
        assert!(
            state.captcha_solutions == std::collections::BTreeSet::from(["otter".to_string()])
                || state.captcha_solutions
                    == std::collections::BTreeSet::from(["heron".to_string()])
        );
    }
}
